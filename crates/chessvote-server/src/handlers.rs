//! REST endpoint handlers for the voting API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/start-voting` | Open a round (optional `{"duration": n}`) |
//! | `POST` | `/submit-move` | Vote for `{"from", "to"}` in the open round |
//! | `POST` | `/end-voting` | Close the open round now |
//! | `POST` | `/ws-client-move` | Apply a move through the rules engine |
//! | `GET` | `/connected-clients` | Number of connected viewers |
//! | `GET` | `/status` | Session status snapshot |
//!
//! Request bodies are decoded regardless of `Content-Type`, since the
//! existing clients do not all set it.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use chessvote_core::session::check_move_shape;
use chessvote_types::{ConnectedClients, Move};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for `POST /start-voting`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct StartVotingRequest {
    /// Round length in seconds; the configured default when absent.
    pub duration: Option<u32>,
}

fn decode_start_request(body: &Bytes) -> Result<StartVotingRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StartVotingRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody(e.to_string()))
}

fn decode_move(body: &Bytes) -> Result<Move, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody(e.to_string()))
}

// ---------------------------------------------------------------------------
// POST /start-voting
// ---------------------------------------------------------------------------

/// Open a voting round.
pub async fn start_voting(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request = decode_start_request(&body)?;
    let duration = request
        .duration
        .unwrap_or(state.settings.default_duration_secs);

    state.session.start_voting(duration).await?;

    Ok("Voting phase started")
}

// ---------------------------------------------------------------------------
// POST /submit-move
// ---------------------------------------------------------------------------

/// Cast one vote in the open round.
pub async fn submit_move(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let candidate = decode_move(&body)?;
    state.session.submit_move(candidate).await?;
    Ok("Move submitted")
}

// ---------------------------------------------------------------------------
// POST /end-voting
// ---------------------------------------------------------------------------

/// Close the open round and broadcast its result.
pub async fn end_voting(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let summary = state.session.end_voting().await?;
    info!(
        round = %summary.round,
        votes_cast = summary.votes_cast,
        "Voting phase ended by request"
    );
    Ok("Voting phase ended")
}

// ---------------------------------------------------------------------------
// POST /ws-client-move
// ---------------------------------------------------------------------------

/// Hand a move straight to the rules engine, bypassing the vote.
///
/// Only the move's shape is checked here; legality is up to the engine.
pub async fn ws_client_move(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let candidate = decode_move(&body)?;
    check_move_shape(&candidate)?;
    state.rules.apply_move(&candidate)?;
    Ok("Move submitted")
}

// ---------------------------------------------------------------------------
// GET /connected-clients
// ---------------------------------------------------------------------------

/// Report how many viewers are connected.
pub async fn connected_clients(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let count = state.subscriber_count().await;
    Json(ConnectedClients {
        connected_clients: u64::try_from(count).unwrap_or(u64::MAX),
    })
}

// ---------------------------------------------------------------------------
// GET /status
// ---------------------------------------------------------------------------

/// Report the session's phase, timer, and vote count.
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.session.status().await)
}
