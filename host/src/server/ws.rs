use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::server::HostState;
use zkpool_coordinator::{metrics, ProverConn};
use zkpool_lib::{Frame, MessageType, Register};

/// How long a connecting prover gets to present its identity.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// Outbound frames queued per prover before dispatches start failing.
const SEND_CHANNEL_CAPACITY: usize = 64;

pub async fn ws_handler(State(state): State<HostState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

/// Drive one prover connection: handshake, then pump frames both ways
/// until the socket closes or the host shuts down.
async fn handle_socket(state: HostState, mut socket: WebSocket) {
    let Some(register) = await_register(&mut socket).await else {
        debug!("prover connection closed before a valid handshake");
        return;
    };
    if !register.has_valid_identity() {
        warn!(name = %register.name, "rejecting prover with a malformed identity");
        return;
    }

    let identity = register.identity.clone();
    let (tx, mut outbound) = mpsc::channel::<Frame>(SEND_CHANNEL_CAPACITY);
    let conn = Arc::new(ProverConn::new(
        identity.clone(),
        register.name.clone(),
        tx,
    ));
    state.registry.add(conn.clone());
    metrics::set_connected_provers(state.registry.len());
    info!(prover = %identity, name = %register.name, "prover registered");

    let (mut sink, mut stream) = socket.split();
    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            next = stream.next() => {
                let data = match next {
                    Some(Ok(Message::Text(text))) => text.into_bytes(),
                    Some(Ok(Message::Binary(data))) => data,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        debug!(prover = %identity, %err, "websocket read failed");
                        break;
                    }
                };
                let frame: Frame = match serde_json::from_slice(&data) {
                    Ok(frame) => frame,
                    Err(err) => {
                        // decode errors never touch coordinator state
                        warn!(prover = %identity, %err, "dropping undecodable frame");
                        continue;
                    }
                };
                if !state.hub.deliver(identity.clone(), frame).await {
                    break;
                }
            }
        }
    }

    conn.mark_closed();
    state.registry.remove(&conn);
    metrics::set_connected_provers(state.registry.len());
    send_task.abort();
    info!(prover = %identity, "prover disconnected");
}

/// The first data frame of a connection must be a `Register`.
async fn await_register(socket: &mut WebSocket) -> Option<Register> {
    let handshake = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
        while let Some(Ok(message)) = socket.recv().await {
            let data = match message {
                Message::Text(text) => text.into_bytes(),
                Message::Binary(data) => data,
                _ => continue,
            };
            let frame: Frame = match serde_json::from_slice(&data) {
                Ok(frame) => frame,
                Err(err) => {
                    debug!(%err, "dropping undecodable handshake frame");
                    continue;
                }
            };
            if frame.message_type != u8::from(MessageType::Register) {
                warn!("expected a register frame, got type {}", frame.message_type);
                return None;
            }
            match frame.decode_payload::<Register>() {
                Ok(register) => return Some(register),
                Err(err) => {
                    warn!(%err, "malformed register payload");
                    return None;
                }
            }
        }
        None
    });
    handshake.await.ok().flatten()
}
