use tokio::sync::mpsc;
use tracing::warn;

use zkpool_lib::Frame;

/// A decoded frame together with the authenticated identity of its sender.
#[derive(Debug)]
pub struct Inbound {
    pub from: String,
    pub frame: Frame,
}

/// Fans inbound frames from every prover connection into the coordinator's
/// single message channel.
#[derive(Debug, Clone)]
pub struct MessageHub {
    tx: mpsc::Sender<Inbound>,
}

impl MessageHub {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Inbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Hand a frame to the coordinator. Returns false once the coordinator
    /// has shut down.
    pub async fn deliver(&self, from: String, frame: Frame) -> bool {
        let delivered = self.tx.send(Inbound { from, frame }).await.is_ok();
        if !delivered {
            warn!("coordinator inbound channel closed; dropping frame");
        }
        delivered
    }
}
