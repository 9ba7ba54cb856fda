//! `WebSocket` handler for live session updates.
//!
//! Clients connect to `GET /ws` and receive each session event as a JSON
//! text frame, in publish order. Every connection registers its own
//! bounded channel with the subscriber registry; the broadcast dispatcher
//! pushes into it and this handler writes to the socket.
//!
//! The handler also pings the client on a fixed interval. Every write is
//! bounded by the configured send timeout, so a viewer that stops reading
//! is dropped instead of parking the handler. A failed or timed-out
//! write, a close frame, or the registry dropping our channel ends the
//! connection, and the subscriber is unregistered on the way out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::state::AppState;

/// Why a frame could not be written to a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendFailure {
    /// The socket reported an error.
    Closed,
    /// The write did not finish within the send timeout.
    TimedOut,
}

/// Await a socket write for at most `limit`.
async fn send_within<F, E>(limit: Duration, send: F) -> Result<(), SendFailure>
where
    F: Future<Output = Result<(), E>>,
{
    match tokio::time::timeout(limit, send).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(SendFailure::Closed),
        Err(_) => Err(SendFailure::TimedOut),
    }
}

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming session events.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_session(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_failed_upgrade(|e| warn!("WebSocket upgrade failed: {e}"))
        .on_upgrade(|socket| handle_ws(socket, state))
}

/// Handle the `WebSocket` lifecycle: register, forward events, keep the
/// connection alive, and unregister when it ends.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let (id, mut rx) = state.connect().await;
    let limit = state.settings.send_timeout;

    let mut keepalive = tokio::time::interval(state.settings.ping_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    keepalive.tick().await;

    loop {
        tokio::select! {
            // Next event from the broadcast dispatcher.
            event = rx.recv() => {
                let Some(event) = event else {
                    debug!(%id, "Subscriber channel closed by registry");
                    break;
                };
                let json = match serde_json::to_string(&event) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!("Failed to serialize session event: {e}");
                        continue;
                    }
                };
                if let Err(failure) = send_within(limit, socket.send(Message::Text(json.into()))).await {
                    debug!(%id, ?failure, "WebSocket client dropped (event send)");
                    break;
                }
            }
            _ = keepalive.tick() => {
                let ping = socket.send(Message::Ping(Bytes::from_static(b"ping")));
                if let Err(failure) = send_within(limit, ping).await {
                    debug!(%id, ?failure, "WebSocket client dropped (ping)");
                    break;
                }
            }
            // Client frames: only close and ping matter.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(failure) = send_within(limit, socket.send(Message::Pong(data))).await {
                            debug!(%id, ?failure, "WebSocket client dropped (pong)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(%id, "WebSocket error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    state.disconnect(id).await;
}
