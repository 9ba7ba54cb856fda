//! Vote aggregation for a closed round.
//!
//! The winner is the move with the strictly highest count. When several
//! moves share the highest count, the one whose first vote arrived
//! earliest wins. Counts are kept in first-submission order, so the
//! result never depends on hash or map iteration order. A hash index
//! into that list keeps counting linear in the number of votes; this
//! runs under the session lock.

use std::collections::HashMap;

use chessvote_types::Move;

/// Number of votes one distinct move received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCount {
    /// The move as first submitted.
    pub candidate: Move,
    /// How many times it was submitted.
    pub votes: u64,
}

/// Count every distinct move, in order of its first submission.
pub fn tally(moves: &[Move]) -> Vec<MoveCount> {
    let mut counts: Vec<MoveCount> = Vec::new();
    let mut position: HashMap<&Move, usize> = HashMap::with_capacity(moves.len());

    for submitted in moves {
        if let Some(count) = position.get(submitted).and_then(|&i| counts.get_mut(i)) {
            count.votes = count.votes.saturating_add(1);
        } else {
            position.insert(submitted, counts.len());
            counts.push(MoveCount {
                candidate: submitted.clone(),
                votes: 1,
            });
        }
    }
    counts
}

/// Pick the winning move, or `None` when nobody voted.
pub fn resolve(moves: &[Move]) -> Option<Move> {
    let mut best: Option<MoveCount> = None;
    for count in tally(moves) {
        // Strict comparison keeps the earlier entry on ties.
        if best.as_ref().is_none_or(|b| count.votes > b.votes) {
            best = Some(count);
        }
    }
    best.map(|b| b.candidate)
}
