//! Read-only projections served by the status endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::events::{Move, Phase};
use crate::ids::RoundId;

/// Point-in-time view of the voting session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionStatus {
    /// Current phase.
    pub phase: Phase,
    /// Seconds left in the open round, if any.
    pub timer: Option<u32>,
    /// Moves submitted in the open round so far.
    #[ts(type = "number")]
    pub votes_cast: u64,
    /// The open round, if any.
    pub round: Option<RoundId>,
    /// Wall-clock time the open round started.
    pub round_started_at: Option<DateTime<Utc>>,
    /// Winner of the most recently closed round, if it had one.
    pub last_winner: Option<Move>,
}

/// Connected viewer count, as returned by `GET /connected-clients`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ConnectedClients {
    /// Number of registered viewer channels.
    #[ts(type = "number")]
    pub connected_clients: u64,
}
