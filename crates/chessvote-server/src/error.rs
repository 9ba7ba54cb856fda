//! Error types for the voting API.
//!
//! [`ApiError`] unifies every failure a handler can report and converts
//! into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Command
//! errors are client mistakes and map to `400`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chessvote_core::SessionError;
use chessvote_core::rules::RulesError;

/// Errors that can occur in the voting API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The session rejected the command.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The rules engine rejected or failed to apply a move.
    #[error(transparent)]
    Rules(#[from] RulesError),

    /// The request body could not be decoded.
    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Session(SessionError::AlreadyVoting) => {
                (StatusCode::BAD_REQUEST, "Voting phase already started".to_owned())
            }
            Self::Session(SessionError::NotVoting) => {
                (StatusCode::BAD_REQUEST, "Voting phase not started".to_owned())
            }
            Self::Session(SessionError::InvalidInput(_)) | Self::InvalidBody(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::Rules(e @ RulesError::Rejected { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            Self::Rules(e @ RulesError::Internal { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
