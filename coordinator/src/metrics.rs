use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};

lazy_static! {
    pub static ref SESSIONS_STARTED: IntCounter = register_int_counter!(
        "zkpool_sessions_started_total",
        "number of proving sessions dispatched"
    )
    .unwrap();
    pub static ref SESSIONS_FINALIZED: IntCounterVec = register_int_counter_vec!(
        "zkpool_sessions_finalized_total",
        "number of proving sessions finalized, by outcome",
        &["outcome"]
    )
    .unwrap();
    pub static ref PROOFS_RECEIVED: IntCounterVec = register_int_counter_vec!(
        "zkpool_proofs_received_total",
        "number of proof submissions handled, by result",
        &["result"]
    )
    .unwrap();
    pub static ref ACTIVE_SESSIONS: IntGauge = register_int_gauge!(
        "zkpool_active_sessions",
        "number of sessions currently collecting proofs"
    )
    .unwrap();
    pub static ref CONNECTED_PROVERS: IntGauge = register_int_gauge!(
        "zkpool_connected_provers",
        "number of provers currently registered"
    )
    .unwrap();
}

pub fn observe_session_started(active: usize) {
    SESSIONS_STARTED.inc();
    ACTIVE_SESSIONS.set(active as i64);
}

pub fn observe_session_finalized(outcome: &str, active: usize) {
    SESSIONS_FINALIZED.with_label_values(&[outcome]).inc();
    ACTIVE_SESSIONS.set(active as i64);
}

pub fn observe_proof_received(result: &str) {
    PROOFS_RECEIVED.with_label_values(&[result]).inc();
}

pub fn set_connected_provers(count: usize) {
    CONNECTED_PROVERS.set(count as i64);
}
