use std::{net::SocketAddr, str::FromStr, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::interfaces::{HostError, HostResult};
use zkpool_coordinator::{ConnRegistry, Coordinator, MessageHub};

pub mod api;
pub mod ws;

/// Shared state of every request handler.
#[derive(Clone)]
pub struct HostState {
    pub coordinator: Arc<Coordinator>,
    pub registry: Arc<ConnRegistry>,
    pub hub: MessageHub,
    /// Cancelled when the transport should stop accepting and drop its
    /// prover connections.
    pub shutdown: CancellationToken,
}

/// Starts the coordinator server.
pub async fn serve(state: HostState, address: &str) -> HostResult<()> {
    let addr = SocketAddr::from_str(address)
        .map_err(|_| HostError::InvalidAddress(address.to_string()))?;
    let listener = TcpListener::bind(addr).await?;

    info!("Listening on: {}", listener.local_addr()?);

    let shutdown = state.shutdown.clone();
    let router = api::create_router().with_state(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Server couldn't serve")?;

    Ok(())
}
