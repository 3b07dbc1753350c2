use std::{collections::VecDeque, sync::Arc};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{sync::mpsc, task::JoinSet};
use tracing::{debug, error, info, warn};

use zkpool_lib::{BlockTraces, Frame, MessageType, Task, TaskStatus};

use crate::{
    collector::SessionCollector, metrics, Coordinator, ProverConn, Session,
    FINISH_SIGNAL_CAPACITY,
};

impl Coordinator {
    /// One dispatch tick: refill the pending buffer if it ran dry, then
    /// start sessions while provers are available.
    pub(crate) async fn dispatch_round(
        &self,
        pending: &mut VecDeque<Task>,
        collectors: &mut JoinSet<()>,
        rng: &mut StdRng,
    ) {
        if pending.is_empty() {
            let idle = self.idle_prover_count().await;
            if idle == 0 {
                return;
            }
            match self
                .store
                .fetch_by_status(TaskStatus::Unassigned, self.cfg.order_session, idle)
                .await
            {
                Ok(tasks) => pending.extend(tasks),
                Err(err) => {
                    warn!(%err, "failed to fetch unassigned tasks");
                    return;
                }
            }
        }

        while let Some(task) = pending.front() {
            if self.try_start_session(task, collectors, rng).await {
                pending.pop_front();
            } else {
                break;
            }
        }
    }

    /// Dispatch one task to a randomly chosen idle prover.
    ///
    /// The task store is only touched after the block trace frame was
    /// accepted by the prover's channel; a store failure rolls the session
    /// back so nothing is left half-assigned.
    pub(crate) async fn try_start_session(
        &self,
        task: &Task,
        collectors: &mut JoinSet<()>,
        rng: &mut StdRng,
    ) -> bool {
        let Some(conn) = self.select_idle_prover(rng).await else {
            return false;
        };

        let traces = BlockTraces {
            id: task.id,
            traces: task.payload.clone(),
        };
        let frame = match Frame::encode(MessageType::BlockTrace, &traces) {
            Ok(frame) => frame,
            Err(err) => {
                error!(id = task.id, %err, "failed to encode block traces");
                return false;
            }
        };
        if conn.send_frame(frame).is_err() {
            debug!(id = task.id, prover = %conn.identity(), "prover rejected dispatch");
            return false;
        }

        let (finish_tx, finish_rx) = mpsc::channel(FINISH_SIGNAL_CAPACITY);
        let session = Arc::new(Session::new(
            task.id,
            conn.identity().to_string(),
            conn.name().to_string(),
            finish_tx,
        ));
        {
            let mut table = self.sessions.write().await;
            if let Err(err) = table.insert(session.clone()) {
                warn!(%err, "refusing to dispatch task twice");
                return false;
            }
        }

        if let Err(err) = self.store.set_status(task.id, TaskStatus::Assigned).await {
            warn!(id = task.id, %err, "failed to mark task assigned; rolling back");
            self.sessions.write().await.remove(task.id);
            if let Err(err) = self.store.set_status(task.id, TaskStatus::Unassigned).await {
                error!(id = task.id, %err, "rollback to unassigned failed");
            }
            return false;
        }

        info!(id = task.id, prover = %conn.identity(), "session started");
        metrics::observe_session_started(self.active_session_count().await);

        let collector = SessionCollector::new(self, session, StdRng::seed_from_u64(rng.gen()));
        collectors.spawn(collector.run(finish_rx));
        true
    }

    /// Uniformly random pick over the registry snapshot, dropping closed
    /// connections from the registry and skipping busy identities.
    pub(crate) async fn select_idle_prover(&self, rng: &mut StdRng) -> Option<Arc<ProverConn>> {
        let mut snapshot = self.registry.snapshot();
        while !snapshot.is_empty() {
            let pick = rng.gen_range(0..snapshot.len());
            let conn = snapshot.swap_remove(pick);
            if conn.is_closed() {
                self.registry.remove(&conn);
                continue;
            }
            if self
                .sessions
                .read()
                .await
                .is_identity_busy(conn.identity())
            {
                continue;
            }
            return Some(conn);
        }
        None
    }

    /// Number of registered provers not currently assigned to a session.
    pub(crate) async fn idle_prover_count(&self) -> usize {
        let snapshot = self.registry.snapshot();
        let table = self.sessions.read().await;
        snapshot
            .iter()
            .filter(|conn| !table.is_identity_busy(conn.identity()))
            .count()
    }
}
