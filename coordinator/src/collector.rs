use std::{sync::Arc, time::Duration};

use rand::{rngs::StdRng, Rng};
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

use zkpool_lib::TaskStatus;
use zkpool_taskdb::TaskStore;

use crate::{
    metrics,
    session::{FailedSessionLog, FinishSignal, Session, SessionTable},
    Coordinator,
};

pub(crate) const EMPTY_SESSION_ERROR: &str =
    "proof generation session ended without receiving any valid proofs";

/// Per-session task that collects participant verdicts until the
/// collection deadline, then tears the session down and finalizes.
pub(crate) struct SessionCollector {
    sessions: Arc<RwLock<SessionTable>>,
    failed_sessions: Arc<FailedSessionLog>,
    store: Arc<dyn TaskStore>,
    session: Arc<Session>,
    collection_time: Duration,
    rng: StdRng,
}

impl SessionCollector {
    pub(crate) fn new(coordinator: &Coordinator, session: Arc<Session>, rng: StdRng) -> Self {
        Self {
            sessions: coordinator.sessions.clone(),
            failed_sessions: coordinator.failed_sessions.clone(),
            store: coordinator.store.clone(),
            session,
            collection_time: coordinator.cfg.collection_time,
            rng,
        }
    }

    pub(crate) async fn run(mut self, mut finish_rx: mpsc::Receiver<FinishSignal>) {
        let deadline = tokio::time::sleep(self.collection_time);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                signal = finish_rx.recv() => match signal {
                    Some((identity, status)) => {
                        self.session.set_participant_status(&identity, status);
                    }
                    // The session itself holds a sender, so this arm only
                    // fires once nothing can signal anymore; sit out the
                    // rest of the window.
                    None => {
                        deadline.as_mut().await;
                        break;
                    }
                },
            }
        }

        self.finalize().await;
    }

    /// Delete the session, then reconcile the store for the empty case.
    ///
    /// The write lock excludes the message router for the deletion itself;
    /// once the session is gone, late proofs are rejected with "no such
    /// session" and the store work below needs no lock.
    async fn finalize(mut self) {
        let id = self.session.id();
        let remaining = {
            let mut table = self.sessions.write().await;
            table.remove(id);
            table.len()
        };

        let valid = self.session.proof_valid_identities();
        if valid.is_empty() {
            warn!(id, "{EMPTY_SESSION_ERROR}");
            self.failed_sessions.record(&self.session, EMPTY_SESSION_ERROR);
            if let Err(err) = self.store.set_status(id, TaskStatus::Failed).await {
                error!(id, %err, "failed to mark timed-out task failed");
            }
            metrics::observe_session_finalized("failed", remaining);
            return;
        }

        // Placeholder for reward attribution; the task status was already
        // settled when the proof arrived.
        let winner = &valid[self.rng.gen_range(0..valid.len())];
        info!(id, prover = %winner, "session finished");
        metrics::observe_session_finalized("verified", remaining);
    }
}
