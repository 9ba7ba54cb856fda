//! Rules engine seam for applying moves to the shared board.
//!
//! The voting core never checks chess legality. A move that reaches
//! `POST /ws-client-move` is handed unconditionally to a [`MoveApplier`],
//! which accepts or rejects it. [`StubRulesEngine`] accepts everything and
//! keeps a log of what it applied, which is enough to exercise the
//! surface end to end until a real board is plugged in.

use std::sync::Mutex;
use std::sync::PoisonError;

use chessvote_types::Move;
use tracing::info;

/// Errors a rules engine can report.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    /// The engine refused the move.
    #[error("move {candidate} rejected: {reason}")]
    Rejected {
        /// The rejected move.
        candidate: Move,
        /// Why it was rejected.
        reason: String,
    },

    /// The engine could not process the move at all.
    #[error("rules engine error: {message}")]
    Internal {
        /// Description of the error.
        message: String,
    },
}

/// Something that applies a move to the game board.
pub trait MoveApplier: Send + Sync {
    /// Apply `candidate` to the board.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] if the move is refused or the engine fails.
    fn apply_move(&self, candidate: &Move) -> Result<(), RulesError>;
}

/// A rules engine that accepts every move and records it.
#[derive(Debug, Default)]
pub struct StubRulesEngine {
    applied: Mutex<Vec<Move>>,
}

impl StubRulesEngine {
    /// Create a stub with an empty move log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every move applied so far, oldest first.
    pub fn applied(&self) -> Vec<Move> {
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MoveApplier for StubRulesEngine {
    fn apply_move(&self, candidate: &Move) -> Result<(), RulesError> {
        info!(%candidate, "Move applied");
        self.applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(candidate.clone());
        Ok(())
    }
}
