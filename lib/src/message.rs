use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// The kind of a framed message exchanged between a prover and the coordinator.
///
/// On the wire the discriminant travels as a raw `u8` so that the router, not
/// the transport, decides what to do with an unknown type.
#[repr(u8)]
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum MessageType {
    /// Free-form error report (prover -> coordinator).
    Error = 0,
    /// Identity presentation at handshake (prover -> coordinator).
    Register = 1,
    /// Block trace dispatch (coordinator -> prover).
    BlockTrace = 2,
    /// Proof submission (prover -> coordinator).
    Proof = 3,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Error => write!(f, "Error"),
            MessageType::Register => write!(f, "Register"),
            MessageType::BlockTrace => write!(f, "BlockTrace"),
            MessageType::Proof => write!(f, "Proof"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("malformed frame payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// The outer envelope of every message on the prover transport.
///
/// The payload is an opaque length-delimited blob; both sides agree on the
/// inner encoding per message type.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub message_type: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Wrap a serializable payload into a frame of the given type.
    pub fn encode<T: Serialize>(message_type: MessageType, payload: &T) -> Result<Self, FrameError> {
        Ok(Self {
            message_type: message_type.into(),
            payload: serde_json::to_vec(payload)?,
        })
    }

    /// Decode the inner payload of this frame.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, FrameError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// Handshake payload presented by a prover when it connects.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Register {
    /// Hex-encoded public key identifying the prover.
    pub identity: String,
    /// Human-readable display name.
    pub name: String,
}

impl Register {
    /// A prover identity is accepted iff it is non-empty hex.
    pub fn has_valid_identity(&self) -> bool {
        !self.identity.is_empty() && hex::decode(&self.identity).is_ok()
    }
}

/// Work dispatched to a prover: the traces of one block.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BlockTraces {
    pub id: u64,
    pub traces: Vec<u8>,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    /// The prover produced a proof.
    Ok,
    /// The prover failed and reports why in `error`.
    Error,
}

/// A prover's answer to a `BlockTrace` dispatch.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ProofSubmission {
    pub id: u64,
    pub status: ProofStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub proof: Vec<u8>,
    #[serde(default)]
    pub final_pair: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_frame_round_trip() {
        let traces = BlockTraces {
            id: 42,
            traces: vec![1, 2, 3],
        };
        let frame = Frame::encode(MessageType::BlockTrace, &traces).unwrap();
        assert_eq!(frame.message_type, u8::from(MessageType::BlockTrace));

        let decoded: BlockTraces = frame.decode_payload().unwrap();
        assert_eq!(decoded, traces);
    }

    #[test]
    fn test_unknown_message_type_is_preserved() {
        let raw = r#"{"type":9,"payload":[]}"#;
        let frame: Frame = serde_json::from_str(raw).unwrap();
        assert!(MessageType::try_from(frame.message_type).is_err());
    }

    #[test]
    fn test_proof_submission_defaults() {
        let raw = r#"{"id":7,"status":"error","error":"oom"}"#;
        let msg: ProofSubmission = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.status, ProofStatus::Error);
        assert_eq!(msg.error.as_deref(), Some("oom"));
        assert!(msg.proof.is_empty());
        assert!(msg.final_pair.is_empty());
    }

    #[test]
    fn test_register_identity_validation() {
        let good = Register {
            identity: "deadbeef".to_string(),
            name: "prover-1".to_string(),
        };
        assert!(good.has_valid_identity());

        let bad = Register {
            identity: "not-hex".to_string(),
            name: "prover-2".to_string(),
        };
        assert!(!bad.has_valid_identity());

        let empty = Register {
            identity: String::new(),
            name: "prover-3".to_string(),
        };
        assert!(!empty.has_valid_identity());
    }
}
