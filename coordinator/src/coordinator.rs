use std::{collections::VecDeque, sync::Arc};

use rand::{rngs::StdRng, SeedableRng};
use tokio::{
    sync::{mpsc, RwLock},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use zkpool_lib::Task;
use zkpool_taskdb::TaskStore;

use crate::{
    session::FailedSessionLog, ConnRegistry, CoordinatorConfig, CoordinatorError,
    FailedSessionInfo, Inbound, SessionInfo, SessionTable, Verifier,
};

/// The stateful engine coordinating the prover pool.
///
/// Owns the session table and the failed-session history. The task store,
/// verifier and connection registry are injected.
pub struct Coordinator {
    pub(crate) cfg: CoordinatorConfig,
    pub(crate) store: Arc<dyn TaskStore>,
    pub(crate) verifier: Option<Arc<dyn Verifier>>,
    pub(crate) registry: Arc<ConnRegistry>,
    pub(crate) sessions: Arc<RwLock<SessionTable>>,
    pub(crate) failed_sessions: Arc<FailedSessionLog>,
}

impl Coordinator {
    pub fn new(
        cfg: CoordinatorConfig,
        store: Arc<dyn TaskStore>,
        verifier: Option<Arc<dyn Verifier>>,
        registry: Arc<ConnRegistry>,
    ) -> Self {
        let failed_sessions = Arc::new(FailedSessionLog::new(cfg.max_failed_sessions));
        Self {
            cfg,
            store,
            verifier,
            registry,
            sessions: Arc::new(RwLock::new(SessionTable::default())),
            failed_sessions,
        }
    }

    pub fn registry(&self) -> &Arc<ConnRegistry> {
        &self.registry
    }

    /// Main loop: dispatch ticker, inbound prover messages, cancellation.
    ///
    /// On entry any task left `Assigned` by a previous run is reset so the
    /// dispatcher can hand it out again. On cancellation the loop stops
    /// dispatching and routing, then waits for outstanding session
    /// collectors to reconcile the store before returning; the caller is
    /// expected to have torn down the transport first.
    pub async fn run(
        self: Arc<Self>,
        mut inbound: mpsc::Receiver<Inbound>,
        cancel: CancellationToken,
    ) -> Result<(), CoordinatorError> {
        let reset = self.store.reset_assigned().await?;
        if reset > 0 {
            warn!(tasks = reset, "reset assigned tasks left over from a previous run");
        }

        let mut rng = match self.cfg.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut ticker = tokio::time::interval(self.cfg.dispatch_interval);
        let mut pending: VecDeque<Task> = VecDeque::new();
        let mut collectors: JoinSet<()> = JoinSet::new();

        info!("coordinator started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.dispatch_round(&mut pending, &mut collectors, &mut rng).await;
                }
                next = inbound.recv() => match next {
                    Some(Inbound { from, frame }) => {
                        if let Err(err) = self.handle_message(&from, frame).await {
                            warn!(prover = %from, %err, "rejected inbound message");
                        }
                    }
                    None => break,
                },
            }
        }

        info!(
            outstanding = collectors.len(),
            "coordinator stopping; draining session collectors"
        );
        while collectors.join_next().await.is_some() {}
        Ok(())
    }

    /// Read-only view of every active session.
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.read().await.infos()
    }

    /// Read-only view of the retained failed-session history.
    pub fn list_failed_sessions(&self) -> Vec<FailedSessionInfo> {
        self.failed_sessions.snapshot()
    }

    pub(crate) async fn active_session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
