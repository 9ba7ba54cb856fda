//! Voting API server for Chessvote.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Command endpoints** (`/start-voting`, `/submit-move`,
//!   `/end-voting`) driving the shared [`VotingSession`]
//! - **`WebSocket` endpoint** (`/ws`) streaming every session event to
//!   connected viewers in publish order
//! - **Board endpoint** (`/ws-client-move`) forwarding a move to the rules
//!   engine
//! - **Read-only endpoints** (`/connected-clients`, `/status`)
//!
//! # Architecture
//!
//! Handlers call into the session, which mutates state under its lock and
//! enqueues events. A single dispatcher task fans those out to the
//! registered viewer channels; each `WebSocket` task drains its own
//! channel onto the socket. A slow or broken viewer never holds up the
//! session or the other viewers.
//!
//! [`VotingSession`]: chessvote_core::VotingSession

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::{ApiSettings, AppState};
