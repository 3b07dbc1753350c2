use axum::{extract::State, routing::get, Json, Router};
use prometheus::TextEncoder;
use tower_http::trace::TraceLayer;

use crate::server::{ws, HostState};
use zkpool_coordinator::{FailedSessionInfo, SessionInfo};

pub fn create_router() -> Router<HostState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/roller/sessions", get(list_sessions))
        .route("/roller/failed_sessions", get(list_failed_sessions))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "OK"
}

async fn metrics() -> String {
    TextEncoder::new()
        .encode_to_string(&prometheus::gather())
        .unwrap_or_default()
}

async fn list_sessions(State(state): State<HostState>) -> Json<Vec<SessionInfo>> {
    Json(state.coordinator.list_sessions().await)
}

async fn list_failed_sessions(State(state): State<HostState>) -> Json<Vec<FailedSessionInfo>> {
    Json(state.coordinator.list_failed_sessions())
}
