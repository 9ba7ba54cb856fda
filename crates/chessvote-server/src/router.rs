//! Axum router construction for the voting API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with request tracing and CORS for the browser clients.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the voting server.
///
/// The router includes:
/// - `POST /start-voting`
/// - `POST /submit-move`
/// - `POST /end-voting`
/// - `POST /ws-client-move`
/// - `GET /connected-clients`
/// - `GET /status`
/// - `GET /ws` -- `WebSocket` session event stream
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.settings.allowed_origins);

    Router::new()
        // Voting commands
        .route("/start-voting", post(handlers::start_voting))
        .route("/submit-move", post(handlers::submit_move))
        .route("/end-voting", post(handlers::end_voting))
        // Direct board moves
        .route("/ws-client-move", post(handlers::ws_client_move))
        // Read-only
        .route("/connected-clients", get(handlers::connected_clients))
        .route("/status", get(handlers::status))
        // WebSocket
        .route("/ws", get(ws::ws_session))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// CORS policy: `GET`/`POST` with a `Content-Type` header, from the
/// configured origins. Any entry of `*` opens it to every origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%origin, "Ignoring invalid CORS origin: {e}");
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(allowed))
}
