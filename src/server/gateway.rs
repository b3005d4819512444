//! Subscriber gateway
//!
//! Adapts one upgraded WebSocket connection to the hub: register on open,
//! drain the subscriber queue into the socket, unregister on close. The
//! stream is push-only; anything the client sends is read and discarded.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio_util::sync::CancellationToken;

use crate::hub::BroadcastHub;

/// Shared state for the WebSocket routes
#[derive(Clone)]
pub(crate) struct GatewayState {
    pub hub: Arc<BroadcastHub>,
    pub max_message_size: usize,
    pub shutdown: CancellationToken,
}

/// Why a subscriber connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    /// Client sent a close frame or the stream ended
    Remote,
    /// Reading from the socket failed
    ReadError,
    /// Writing a record to the socket failed
    SendFailed,
    /// Queue sender went away (unregistered elsewhere)
    QueueClosed,
    /// Server is shutting down
    Shutdown,
}

pub(crate) async fn handle_ws(
    State(state): State<GatewayState>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(state.max_message_size)
        .max_frame_size(state.max_message_size)
        .on_upgrade(move |socket| serve_subscriber(socket, peer_addr, state))
}

async fn serve_subscriber(mut socket: WebSocket, peer_addr: SocketAddr, state: GatewayState) {
    let connected_at = Instant::now();
    let (subscriber, mut queue) = state.hub.new_subscriber();
    let id = subscriber.id();

    tracing::debug!(subscriber = %id, peer = %peer_addr, "Subscriber connected");
    state.hub.register(subscriber).await;

    let reason = loop {
        tokio::select! {
            biased;

            _ = state.shutdown.cancelled() => break CloseReason::Shutdown,

            payload = queue.recv() => {
                let Some(payload) = payload else {
                    break CloseReason::QueueClosed;
                };

                // Records are serialized by serde_json, always valid UTF-8
                let text = match Utf8Bytes::try_from(payload) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(subscriber = %id, error = %e, "Skipping non UTF-8 payload");
                        continue;
                    }
                };

                if let Err(e) = socket.send(Message::Text(text)).await {
                    tracing::debug!(subscriber = %id, error = %e, "Send failed");
                    break CloseReason::SendFailed;
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break CloseReason::Remote,
                    // Push-only stream: inbound data is ignored
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::debug!(subscriber = %id, error = %e, "Read failed");
                        break CloseReason::ReadError;
                    }
                }
            }
        }
    };

    state.hub.unregister(id).await;

    if reason == CloseReason::Shutdown {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::AWAY,
                reason: Utf8Bytes::from_static("server shutting down"),
            })))
            .await;
    }

    tracing::debug!(
        subscriber = %id,
        peer = %peer_addr,
        reason = ?reason,
        duration_ms = connected_at.elapsed().as_millis() as u64,
        "Subscriber disconnected"
    );
}
