use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
};

use tokio::sync::mpsc;
use tracing::debug;

use zkpool_lib::Frame;

/// One connected prover: its identity, display name and outbound channel.
///
/// Sessions never hold a `ProverConn`; they keep the identity string and
/// re-resolve it through the registry, so a disconnected prover is naturally
/// skipped.
#[derive(Debug)]
pub struct ProverConn {
    identity: String,
    name: String,
    sender: mpsc::Sender<Frame>,
    closed: AtomicBool,
}

impl ProverConn {
    pub fn new(identity: String, name: String, sender: mpsc::Sender<Frame>) -> Self {
        Self {
            identity,
            name,
            sender,
            closed: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Queue a frame for delivery. Any failure means the prover is dead to
    /// the caller.
    pub fn send_frame(&self, frame: Frame) -> Result<(), ()> {
        if self.is_closed() {
            return Err(());
        }
        self.sender.try_send(frame).map_err(|err| {
            if matches!(err, mpsc::error::TrySendError::Closed(_)) {
                self.mark_closed();
            }
            debug!(prover = %self.identity, "outbound frame dropped");
        })
    }
}

/// Set of live prover connections, keyed by identity.
#[derive(Debug, Default)]
pub struct ConnRegistry {
    conns: RwLock<HashMap<String, Arc<ProverConn>>>,
}

impl ConnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. A reconnect with the same identity replaces
    /// the previous entry.
    pub fn add(&self, conn: Arc<ProverConn>) {
        let mut conns = self.conns.write().unwrap();
        if let Some(old) = conns.insert(conn.identity().to_string(), conn) {
            old.mark_closed();
        }
    }

    /// Remove a connection. Idempotent; a newer connection under the same
    /// identity is left alone.
    pub fn remove(&self, conn: &Arc<ProverConn>) {
        let mut conns = self.conns.write().unwrap();
        if let Some(current) = conns.get(conn.identity()) {
            if Arc::ptr_eq(current, conn) {
                conns.remove(conn.identity());
            }
        }
    }

    pub fn get(&self, identity: &str) -> Option<Arc<ProverConn>> {
        self.conns.read().unwrap().get(identity).cloned()
    }

    /// Shallow copy of the live set; the caller may mutate its local list
    /// freely during selection.
    pub fn snapshot(&self) -> Vec<Arc<ProverConn>> {
        self.conns.read().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.conns.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(identity: &str) -> (Arc<ProverConn>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(4);
        (
            Arc::new(ProverConn::new(identity.to_string(), identity.to_string(), tx)),
            rx,
        )
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ConnRegistry::new();
        let (c1, _rx) = conn("aa");
        registry.add(c1.clone());

        registry.remove(&c1);
        registry.remove(&c1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reconnect_replaces_and_remove_spares_newer() {
        let registry = ConnRegistry::new();
        let (old, _rx1) = conn("aa");
        let (new, _rx2) = conn("aa");
        registry.add(old.clone());
        registry.add(new.clone());

        assert!(old.is_closed());

        // removing the stale handle must not evict the live connection
        registry.remove(&old);
        assert!(registry.get("aa").is_some());
    }

    #[test]
    fn test_send_after_close_fails() {
        let (c1, mut rx) = conn("aa");
        let frame = Frame {
            message_type: 0,
            payload: vec![],
        };
        assert!(c1.send_frame(frame.clone()).is_ok());
        assert!(rx.try_recv().is_ok());

        c1.mark_closed();
        assert!(c1.send_frame(frame).is_err());
    }
}
