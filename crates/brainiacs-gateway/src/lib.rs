//! # brainiacs-gateway
//!
//! Real-time WebSocket gateway for Brainiacs. Handles:
//! - Identification by profile email
//! - Board-room subscriptions (automatic on identify, explicit via ops)
//! - Event dispatch from the shared fan-out channel
//! - Heartbeat/keepalive
//!
//! There is no session resume: a client that reconnects identifies again.

pub mod protocol;
pub mod session;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use brainiacs_api::AppState;
use brainiacs_common::presence::PresenceRegistry;
use futures_util::{SinkExt, StreamExt};
use protocol::{ClientOp, ServerOp};
use session::Session;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Gateway state. Shares the API's store and fan-out so REST mutations reach
/// sockets and socket ops run the REST code paths.
#[derive(Clone)]
pub struct GatewayState {
    pub app: Arc<AppState>,
    pub heartbeat_interval_ms: u64,
}

impl GatewayState {
    pub fn new(app: Arc<AppState>, heartbeat_interval_ms: u64) -> Self {
        Self {
            app,
            heartbeat_interval_ms,
        }
    }

    pub fn presence(&self) -> &PresenceRegistry {
        self.app.fanout.presence()
    }
}

/// Build the gateway WebSocket router.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/gateway", get(ws_handler))
        .with_state(Arc::new(state))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<GatewayState>>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

fn encode(op: &ServerOp) -> Option<Message> {
    match serde_json::to_string(op) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!("Failed to encode gateway frame: {e}");
            None
        }
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before registering so no event published after `open` is missed.
    let mut broadcast_rx = state.app.fanout.subscribe();
    let mut session = Session::open(state.clone()).await;
    let connection_id = session.connection_id();
    let filter = session.filter();

    // Direct-send channel: receive loop → sender task (ready, acks, errors).
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerOp>(64);

    if let Some(hello) = encode(&session.hello()) {
        if sender.send(hello).await.is_err() {
            session.close().await;
            return;
        }
    }

    // ── Sender task ──────────────────────────────────────────────────────────
    // Merges fanned-out events (filtered to this connection) and direct
    // replies onto the single WebSocket sender.
    let send_task = tokio::spawn(async move {
        loop {
            let op = tokio::select! {
                received = broadcast_rx.recv() => match received {
                    Ok(event) => match filter.admit(&event).await {
                        Some(op) => op,
                        None => continue,
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(connection_id = %connection_id, skipped, "Gateway connection lagged, events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                direct = direct_rx.recv() => match direct {
                    Some(op) => op,
                    None => break,
                },
            };

            let Some(frame) = encode(&op) else { continue };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    // ── Receive loop ─────────────────────────────────────────────────────────
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                let op = match serde_json::from_str::<ClientOp>(&text) {
                    Ok(op) => op,
                    Err(e) => {
                        let _ = direct_tx
                            .send(ServerOp::Error {
                                code: "VALIDATION_ERROR".into(),
                                message: format!("Malformed gateway frame: {e}"),
                            })
                            .await;
                        continue;
                    }
                };
                if let Some(reply) = session.handle(op).await {
                    if direct_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // ── Cleanup ───────────────────────────────────────────────────────────────
    send_task.abort();
    let user_id = session.close().await;
    tracing::info!(connection_id = %connection_id, user_id = ?user_id, "Client disconnected from gateway");
}
