mod collector;
mod config;
mod conn;
mod coordinator;
mod dispatcher;
mod hub;
pub mod metrics;
mod router;
mod session;
mod verifier;

// Re-export
pub use config::{CoordinatorConfig, FINISH_SIGNAL_CAPACITY};
pub use conn::{ConnRegistry, ProverConn};
pub use coordinator::Coordinator;
pub use hub::{Inbound, MessageHub};
pub use session::{
    FailedSessionInfo, FailedSessionLog, Participant, ParticipantInfo, ParticipantStatus, Session,
    SessionInfo, SessionTable,
};
pub use verifier::{MockVerifier, RpcVerifier, Verifier, VerifierError};

use zkpool_lib::{FrameError, MessageType};
use zkpool_taskdb::TaskStoreError;

#[derive(thiserror::Error, Debug)]
pub enum CoordinatorError {
    #[error("no session for task {0}")]
    NoSuchSession(u64),
    #[error("prover {identity} is not a participant of session {id}")]
    NotAParticipant { id: u64, identity: String },
    #[error("unexpected {0} message from a prover")]
    ProtocolViolation(MessageType),
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
    #[error("malformed message payload: {0}")]
    Decode(#[from] FrameError),
    #[error("session {0} already exists")]
    DuplicateSession(u64),
    #[error("task store error: {0}")]
    Store(#[from] TaskStoreError),
}
