pub mod message;
pub mod task;

// Re-export
pub use message::{
    BlockTraces, Frame, FrameError, MessageType, ProofStatus, ProofSubmission, Register,
};
pub use task::{OrderBy, Task, TaskStatus};
