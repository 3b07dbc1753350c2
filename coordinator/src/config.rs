use std::time::Duration;

use zkpool_lib::OrderBy;

/// Capacity of a session's finish-signal buffer. Sized so that every
/// participant of a session can deliver its result without blocking the
/// message router while it holds the session table read lock.
pub const FINISH_SIGNAL_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Per-session deadline after which collected results are finalized.
    pub collection_time: Duration,
    /// Ordering when fetching unassigned tasks from the store.
    pub order_session: OrderBy,
    /// Period of the dispatch ticker.
    pub dispatch_interval: Duration,
    /// Upper bound on retained failed-session snapshots.
    pub max_failed_sessions: usize,
    /// Seed for prover and winner selection; `None` seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            collection_time: Duration::from_secs(5 * 60),
            order_session: OrderBy::Asc,
            dispatch_interval: Duration::from_secs(3),
            max_failed_sessions: 128,
            rng_seed: None,
        }
    }
}
