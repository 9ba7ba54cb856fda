//! Session events pushed to viewers and the moves they carry.
//!
//! The JSON shapes here are consumed verbatim by the browser clients, so
//! field names are part of the wire contract:
//!
//! - `{"currentPhase": "voting", "timer": 12}`
//! - `{"currentPhase": "idle"}`
//! - `{"from": "e2", "to": "e4"}`

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A proposed move from one square to another.
///
/// Two moves with the same `from` and `to` are the same move for
/// tallying purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Move {
    /// Origin square, e.g. `e2`.
    pub from: String,
    /// Destination square, e.g. `e4`.
    pub to: String,
}

impl Move {
    /// Build a move from any pair of string-like squares.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl core::fmt::Display for Move {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}{}", self.from, self.to)
    }
}

/// The session's current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No round in progress.
    Idle,
    /// A round is open and accepting moves.
    Voting,
}

/// Phase change or countdown tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PhaseUpdate {
    /// The phase after the change.
    #[serde(rename = "currentPhase")]
    pub current_phase: Phase,
    /// Seconds left in the round; absent while idle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub timer: Option<u32>,
}

impl PhaseUpdate {
    /// A voting update carrying the remaining seconds.
    pub const fn voting(remaining: u32) -> Self {
        Self {
            current_phase: Phase::Voting,
            timer: Some(remaining),
        }
    }

    /// The update sent when a round closes.
    pub const fn idle() -> Self {
        Self {
            current_phase: Phase::Idle,
            timer: None,
        }
    }
}

/// One outbound event in the session's ordered stream.
///
/// Serialized untagged so each variant keeps its own flat JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(untagged)]
pub enum SessionEvent {
    /// Phase transition or countdown tick.
    PhaseUpdate(PhaseUpdate),
    /// The winning move of a round that just closed.
    ResolvedMove(Move),
}

impl SessionEvent {
    /// Shorthand for a voting tick event.
    pub const fn voting(remaining: u32) -> Self {
        Self::PhaseUpdate(PhaseUpdate::voting(remaining))
    }

    /// Shorthand for the idle event.
    pub const fn idle() -> Self {
        Self::PhaseUpdate(PhaseUpdate::idle())
    }
}
