//! Voting session coordination for the Chessvote crowd-voting server.
//!
//! This crate owns the parts with real coordination semantics: the single
//! authoritative session, the countdown racing against client commands,
//! and delivery of every state change to a changing set of viewers.
//!
//! # Modules
//!
//! - [`session`] -- The Idle/Voting state machine and its round-scoped
//!   countdown task.
//! - [`tally`] -- Deterministic winner resolution for a closed round.
//! - [`registry`] -- Live viewer channels.
//! - [`broadcast`] -- The ordered event stream and its fan-out dispatcher.
//! - [`rules`] -- [`MoveApplier`] trait and [`StubRulesEngine`].
//! - [`config`] -- Configuration loading from `chessvote-config.yaml`.
//!
//! [`MoveApplier`]: rules::MoveApplier
//! [`StubRulesEngine`]: rules::StubRulesEngine

pub mod broadcast;
pub mod config;
pub mod registry;
pub mod rules;
pub mod session;
pub mod tally;

pub use broadcast::{BroadcastEngine, EventPublisher};
pub use registry::{Subscriber, SubscriberRegistry};
pub use session::{SessionError, VotingSession};
