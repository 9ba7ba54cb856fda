//! Shared type definitions for the Chessvote crowd-voting server.
//!
//! This crate is the single source of truth for the types that cross
//! crate and process boundaries. Types flow downstream to `TypeScript`
//! via `ts-rs` for the viewer clients.
//!
//! # Modules
//!
//! - [`ids`] -- Subscriber and round identifiers
//! - [`events`] -- Moves, phases, and the outbound event stream
//! - [`status`] -- Read-only status projections

pub mod events;
pub mod ids;
pub mod status;

// Re-export all public types at crate root for convenience.
pub use events::{Move, Phase, PhaseUpdate, SessionEvent};
pub use ids::{RoundId, SubscriberId};
pub use status::{ConnectedClients, SessionStatus};
