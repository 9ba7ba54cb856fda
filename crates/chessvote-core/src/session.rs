//! The voting session state machine.
//!
//! [`VotingSession`] owns the single authoritative session state behind one
//! [`tokio::sync::Mutex`]. Every command (start, submit, end, and the
//! countdown's tick) runs as one critical section, and any events it
//! produces are handed to the [`EventPublisher`] before the lock is
//! released. Publishing is a non-blocking enqueue, so the lock is held for
//! state mutation only, and the event stream order matches the order in
//! which commands took effect.
//!
//! # Rounds and the countdown
//!
//! Starting a round allocates a fresh [`RoundId`] and spawns one countdown
//! task carrying that id. Each tick re-checks the id under the lock; once
//! the round has ended (early, or by a newer round replacing it) the tick
//! is reported as [`TickOutcome::Stale`], mutates nothing, and the task
//! exits.
//!
//! ```text
//!            start_voting(d)
//!   Idle  ------------------->  Voting { round, remaining: d }
//!    ^                               |  tick: remaining -= 1
//!    |      end_voting / expiry      |
//!    +-------------------------------+
//! ```

use std::sync::Arc;
use std::time::Duration;

use chessvote_types::{Move, Phase, RoundId, SessionEvent, SessionStatus};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::broadcast::EventPublisher;
use crate::tally;

/// Longest square name accepted in a submitted move.
pub const MAX_SQUARE_LEN: usize = 8;

/// Errors reported synchronously to the caller of a session command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A round is already open.
    #[error("voting phase already started")]
    AlreadyVoting,

    /// No round is open.
    #[error("voting phase not started")]
    NotVoting,

    /// The command's payload is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Check that a move is structurally well formed.
///
/// Both squares must be non-empty ASCII alphanumeric strings of at most
/// [`MAX_SQUARE_LEN`] characters. Legality on the board is not checked.
pub fn check_move_shape(candidate: &Move) -> Result<(), SessionError> {
    for (field, square) in [("from", &candidate.from), ("to", &candidate.to)] {
        if square.is_empty() {
            return Err(SessionError::InvalidInput(format!("`{field}` is empty")));
        }
        if square.len() > MAX_SQUARE_LEN {
            return Err(SessionError::InvalidInput(format!(
                "`{field}` is longer than {MAX_SQUARE_LEN} characters"
            )));
        }
        if !square.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SessionError::InvalidInput(format!(
                "`{field}` must be ASCII alphanumeric"
            )));
        }
    }
    Ok(())
}

/// The session's phase with the data that only exists while voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No round in progress.
    Idle,
    /// A round is open.
    Voting {
        /// The open round.
        round: RoundId,
        /// Seconds left on the countdown.
        remaining: u32,
    },
}

/// What happened when a round closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    /// The round that closed.
    pub round: RoundId,
    /// How many moves were submitted during it.
    pub votes_cast: usize,
    /// The winning move, if anyone voted.
    pub winner: Option<Move>,
}

/// Result of one countdown tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The round is still open.
    Continued {
        /// Seconds left after this tick.
        remaining: u32,
    },
    /// The countdown reached zero and the round closed.
    Expired(RoundSummary),
    /// The tick belongs to a round that is no longer open; nothing changed.
    Stale,
}

#[derive(Debug)]
struct SessionState {
    phase: SessionPhase,
    moves: Vec<Move>,
    next_round: RoundId,
    round_started_at: Option<DateTime<Utc>>,
    last_winner: Option<Move>,
}

/// The single authoritative voting session.
///
/// Shared as `Arc<VotingSession>`; starting a round needs the `Arc` so the
/// countdown task can hold its own reference.
#[derive(Debug)]
pub struct VotingSession {
    state: Mutex<SessionState>,
    publisher: EventPublisher,
    tick_interval: Duration,
}

impl VotingSession {
    /// Create an idle session publishing to `publisher`, ticking every
    /// `tick_interval`.
    pub fn new(publisher: EventPublisher, tick_interval: Duration) -> Self {
        Self {
            state: Mutex::new(SessionState {
                phase: SessionPhase::Idle,
                moves: Vec::new(),
                next_round: RoundId::FIRST,
                round_started_at: None,
                last_winner: None,
            }),
            publisher,
            tick_interval,
        }
    }

    /// Open a round lasting `duration` ticks.
    ///
    /// Clears any moves left from the previous round, publishes
    /// `{"currentPhase": "voting", "timer": duration}`, and spawns the
    /// round's countdown task.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidInput`] if `duration` is zero, or
    /// [`SessionError::AlreadyVoting`] if a round is open. Neither changes
    /// any state.
    pub async fn start_voting(self: &Arc<Self>, duration: u32) -> Result<RoundId, SessionError> {
        if duration == 0 {
            return Err(SessionError::InvalidInput(
                "duration must be a positive number of seconds".to_owned(),
            ));
        }

        let round = {
            let mut state = self.state.lock().await;
            if matches!(state.phase, SessionPhase::Voting { .. }) {
                return Err(SessionError::AlreadyVoting);
            }

            let round = state.next_round;
            state.next_round = round.next();
            state.moves.clear();
            state.phase = SessionPhase::Voting {
                round,
                remaining: duration,
            };
            state.round_started_at = Some(Utc::now());
            self.publisher.publish(SessionEvent::voting(duration));
            round
        };

        info!(%round, duration, "Voting phase started");
        tokio::spawn(Self::run_countdown(Arc::clone(self), round));
        Ok(round)
    }

    /// Record a vote for `candidate` in the open round.
    ///
    /// No event is published per vote. Returns the number of votes cast
    /// so far in this round.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidInput`] if the move is malformed (checked
    /// before the session is touched), [`SessionError::NotVoting`] if no
    /// round is open.
    pub async fn submit_move(&self, candidate: Move) -> Result<usize, SessionError> {
        check_move_shape(&candidate)?;

        let mut state = self.state.lock().await;
        let SessionPhase::Voting { round, .. } = state.phase else {
            return Err(SessionError::NotVoting);
        };
        debug!(%round, %candidate, "Move submitted");
        state.moves.push(candidate);
        Ok(state.moves.len())
    }

    /// Close the open round now.
    ///
    /// Publishes the idle update, then the winning move as a separate
    /// event if anyone voted. Any pending countdown tick for the round
    /// becomes stale.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotVoting`] if no round is open.
    pub async fn end_voting(&self) -> Result<RoundSummary, SessionError> {
        let mut state = self.state.lock().await;
        let SessionPhase::Voting { round, .. } = state.phase else {
            return Err(SessionError::NotVoting);
        };
        Ok(self.close_round(&mut state, round))
    }

    /// Advance the countdown of `round` by one tick.
    ///
    /// Publishes the new remaining time. When it reaches zero the round
    /// is closed as if [`end_voting`](Self::end_voting) had been called.
    pub async fn tick(&self, round: RoundId) -> TickOutcome {
        let mut state = self.state.lock().await;
        let SessionPhase::Voting {
            round: current,
            remaining,
        } = state.phase
        else {
            return TickOutcome::Stale;
        };
        if current != round {
            return TickOutcome::Stale;
        }

        let remaining = remaining.saturating_sub(1);
        state.phase = SessionPhase::Voting { round, remaining };
        self.publisher.publish(SessionEvent::voting(remaining));

        if remaining == 0 {
            TickOutcome::Expired(self.close_round(&mut state, round))
        } else {
            TickOutcome::Continued { remaining }
        }
    }

    /// The current phase.
    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase
    }

    /// Read-only snapshot for the status endpoint.
    pub async fn status(&self) -> SessionStatus {
        let state = self.state.lock().await;
        let (phase, timer, round) = match state.phase {
            SessionPhase::Idle => (Phase::Idle, None, None),
            SessionPhase::Voting { round, remaining } => {
                (Phase::Voting, Some(remaining), Some(round))
            }
        };
        SessionStatus {
            phase,
            timer,
            votes_cast: u64::try_from(state.moves.len()).unwrap_or(u64::MAX),
            round,
            round_started_at: state.round_started_at,
            last_winner: state.last_winner.clone(),
        }
    }

    /// Close `round`; the caller holds the lock and has checked it is open.
    fn close_round(&self, state: &mut SessionState, round: RoundId) -> RoundSummary {
        state.phase = SessionPhase::Idle;
        state.round_started_at = None;
        let moves = std::mem::take(&mut state.moves);

        self.publisher.publish(SessionEvent::idle());
        let winner = tally::resolve(&moves);
        if let Some(winning) = &winner {
            self.publisher
                .publish(SessionEvent::ResolvedMove(winning.clone()));
        }
        state.last_winner.clone_from(&winner);

        info!(
            %round,
            votes_cast = moves.len(),
            winner = ?winner,
            "Voting phase ended"
        );

        RoundSummary {
            round,
            votes_cast: moves.len(),
            winner,
        }
    }

    async fn run_countdown(session: Arc<Self>, round: RoundId) {
        loop {
            tokio::time::sleep(session.tick_interval).await;
            match session.tick(round).await {
                TickOutcome::Continued { remaining } => {
                    debug!(%round, remaining, "Countdown tick");
                }
                TickOutcome::Expired(_) => {
                    debug!(%round, "Countdown expired");
                    return;
                }
                TickOutcome::Stale => {
                    debug!(%round, "Round already closed, countdown stopped");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    use super::*;

    fn session(tick: Duration) -> (Arc<VotingSession>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (publisher, rx) = EventPublisher::channel();
        (Arc::new(VotingSession::new(publisher, tick)), rx)
    }

    /// A tick interval long enough that the countdown never fires.
    const SLOW: Duration = Duration::from_secs(3600);

    fn a() -> Move {
        Move::new("e2", "e4")
    }

    fn b() -> Move {
        Move::new("d2", "d4")
    }

    #[tokio::test]
    async fn starts_idle() {
        let (session, mut rx) = session(SLOW);
        assert_eq!(session.phase().await, SessionPhase::Idle);
        let status = session.status().await;
        assert_eq!(status.phase, Phase::Idle);
        assert_eq!(status.timer, None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn submit_outside_voting_is_rejected() {
        let (session, _rx) = session(SLOW);
        assert_eq!(session.submit_move(a()).await, Err(SessionError::NotVoting));
        assert_eq!(session.status().await.votes_cast, 0);
    }

    #[tokio::test]
    async fn end_outside_voting_is_rejected() {
        let (session, mut rx) = session(SLOW);
        assert_eq!(session.end_voting().await, Err(SessionError::NotVoting));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn start_publishes_voting_update() {
        let (session, mut rx) = session(SLOW);
        let round = session.start_voting(15).await.unwrap();

        assert_eq!(round, RoundId::FIRST);
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::voting(15));
        assert_eq!(
            session.phase().await,
            SessionPhase::Voting {
                round,
                remaining: 15
            }
        );
    }

    #[tokio::test]
    async fn second_start_keeps_moves() {
        let (session, mut rx) = session(SLOW);
        session.start_voting(10).await.unwrap();
        session.submit_move(a()).await.unwrap();
        session.submit_move(b()).await.unwrap();
        let _ = rx.try_recv();

        assert_eq!(session.start_voting(10).await, Err(SessionError::AlreadyVoting));
        assert_eq!(session.status().await.votes_cast, 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn zero_duration_is_invalid() {
        let (session, _rx) = session(SLOW);
        assert!(matches!(
            session.start_voting(0).await,
            Err(SessionError::InvalidInput(_))
        ));
        assert_eq!(session.phase().await, SessionPhase::Idle);
    }

    #[tokio::test]
    async fn malformed_move_is_rejected_before_state() {
        let (session, _rx) = session(SLOW);
        session.start_voting(10).await.unwrap();

        for bad in [
            Move::new("", "e4"),
            Move::new("e2", ""),
            Move::new("e2 ", "e4"),
            Move::new("e2", "e4e4e4e4e"),
        ] {
            assert!(matches!(
                session.submit_move(bad).await,
                Err(SessionError::InvalidInput(_))
            ));
        }
        assert_eq!(session.status().await.votes_cast, 0);
    }

    #[tokio::test]
    async fn end_publishes_idle_then_winner() {
        let (session, mut rx) = session(SLOW);
        let round = session.start_voting(30).await.unwrap();
        for m in [a(), b(), a(), b()] {
            session.submit_move(m).await.unwrap();
        }

        let summary = session.end_voting().await.unwrap();
        assert_eq!(
            summary,
            RoundSummary {
                round,
                votes_cast: 4,
                winner: Some(a()),
            }
        );

        assert_eq!(rx.try_recv().unwrap(), SessionEvent::voting(30));
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::idle());
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::ResolvedMove(a()));
        assert!(rx.try_recv().is_err());

        let status = session.status().await;
        assert_eq!(status.phase, Phase::Idle);
        assert_eq!(status.votes_cast, 0);
        assert_eq!(status.last_winner, Some(a()));
    }

    #[tokio::test]
    async fn empty_round_emits_only_idle() {
        let (session, mut rx) = session(SLOW);
        session.start_voting(5).await.unwrap();
        let summary = session.end_voting().await.unwrap();

        assert_eq!(summary.winner, None);
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::voting(5));
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::idle());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn new_round_clears_previous_moves() {
        let (session, _rx) = session(SLOW);
        session.start_voting(5).await.unwrap();
        session.submit_move(a()).await.unwrap();
        session.end_voting().await.unwrap();

        let second = session.start_voting(5).await.unwrap();
        assert_eq!(second, RoundId::FIRST.next());
        assert_eq!(session.status().await.votes_cast, 0);
        session.submit_move(b()).await.unwrap();
        assert_eq!(session.end_voting().await.unwrap().winner, Some(b()));
    }

    #[tokio::test]
    async fn stale_tick_changes_nothing() {
        let (session, mut rx) = session(SLOW);
        let round = session.start_voting(5).await.unwrap();
        let _ = rx.try_recv();

        assert_eq!(session.tick(RoundId(round.0 + 1)).await, TickOutcome::Stale);
        session.end_voting().await.unwrap();
        let _ = rx.try_recv();
        assert_eq!(session.tick(round).await, TickOutcome::Stale);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_runs_to_idle_one_second_apart() {
        let (session, mut rx) = session(Duration::from_secs(1));
        let started = Instant::now();
        session.start_voting(3).await.unwrap();
        assert_eq!(rx.recv().await, Some(SessionEvent::voting(3)));

        for (remaining, elapsed) in [(2, 1), (1, 2), (0, 3)] {
            assert_eq!(rx.recv().await, Some(SessionEvent::voting(remaining)));
            assert_eq!(started.elapsed().as_secs(), elapsed);
        }
        assert_eq!(rx.recv().await, Some(SessionEvent::idle()));
        assert_eq!(started.elapsed().as_secs(), 3);

        // Nobody voted, so no resolved move follows.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(session.phase().await, SessionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_resolves_winner() {
        let (session, mut rx) = session(Duration::from_secs(1));
        session.start_voting(2).await.unwrap();
        for m in [b(), a(), a()] {
            session.submit_move(m).await.unwrap();
        }

        let expected = [
            SessionEvent::voting(2),
            SessionEvent::voting(1),
            SessionEvent::voting(0),
            SessionEvent::idle(),
            SessionEvent::ResolvedMove(a()),
        ];
        for event in expected {
            assert_eq!(rx.recv().await, Some(event));
        }
        assert_eq!(session.status().await.last_winner, Some(a()));
    }

    #[tokio::test(start_paused = true)]
    async fn early_end_cancels_pending_ticks() {
        let (session, mut rx) = session(Duration::from_secs(1));
        session.start_voting(3).await.unwrap();
        assert_eq!(rx.recv().await, Some(SessionEvent::voting(3)));
        assert_eq!(rx.recv().await, Some(SessionEvent::voting(2)));

        session.end_voting().await.unwrap();
        assert_eq!(rx.recv().await, Some(SessionEvent::idle()));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(session.phase().await, SessionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_countdown_does_not_touch_new_round() {
        let (session, mut rx) = session(Duration::from_secs(1));
        let first = session.start_voting(3).await.unwrap();
        assert_eq!(rx.recv().await, Some(SessionEvent::voting(3)));
        assert_eq!(rx.recv().await, Some(SessionEvent::voting(2)));
        session.end_voting().await.unwrap();
        assert_eq!(rx.recv().await, Some(SessionEvent::idle()));

        let second = session.start_voting(3).await.unwrap();
        assert_ne!(first, second);

        let expected = [
            SessionEvent::voting(3),
            SessionEvent::voting(2),
            SessionEvent::voting(1),
            SessionEvent::voting(0),
            SessionEvent::idle(),
        ];
        for event in expected {
            assert_eq!(rx.recv().await, Some(event));
        }

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_commands_never_interleave() {
        const DURATION: u32 = 2;
        let (session, mut rx) = session(Duration::from_millis(1));

        let mut tasks = Vec::new();
        for worker in 0..24 {
            let session = Arc::clone(&session);
            tasks.push(tokio::spawn(async move {
                let (mut starts, mut ends, mut first_votes) = (0_usize, 0_usize, 0_usize);
                for _ in 0..200 {
                    match worker % 3 {
                        0 => {
                            if session.start_voting(DURATION).await.is_ok() {
                                starts = starts.saturating_add(1);
                            }
                        }
                        1 => {
                            // The first vote of a round sees a count of one.
                            if session.submit_move(a()).await == Ok(1) {
                                first_votes = first_votes.saturating_add(1);
                            }
                        }
                        _ => {
                            if session.end_voting().await.is_ok() {
                                ends = ends.saturating_add(1);
                            }
                        }
                    }
                    tokio::task::yield_now().await;
                }
                (starts, ends, first_votes)
            }));
        }

        let (mut starts, mut ends, mut first_votes) = (0_usize, 0_usize, 0_usize);
        for task in tasks {
            let (s, e, f) = task.await.unwrap();
            starts = starts.saturating_add(s);
            ends = ends.saturating_add(e);
            first_votes = first_votes.saturating_add(f);
        }
        if session.end_voting().await.is_ok() {
            ends = ends.saturating_add(1);
        }
        // Let leftover countdowns observe the closed round and exit.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        // Every round reads: voting(d), voting(d-1).., idle, [resolved].
        let (mut rounds, mut closes, mut resolved) = (0_usize, 0_usize, 0_usize);
        let mut open: Option<u32> = None;
        let mut just_closed = false;
        for event in &events {
            if event == &SessionEvent::idle() {
                assert!(open.is_some(), "idle outside a round");
                open = None;
                just_closed = true;
                closes = closes.saturating_add(1);
            } else if event == &SessionEvent::ResolvedMove(a()) {
                assert!(just_closed, "winner not right after idle");
                just_closed = false;
                resolved = resolved.saturating_add(1);
            } else {
                let timer = match event {
                    SessionEvent::PhaseUpdate(update) => update.timer,
                    SessionEvent::ResolvedMove(_) => None,
                };
                assert!(timer.is_some(), "unexpected event {event:?}");
                let remaining = timer.unwrap();
                assert_eq!(event, &SessionEvent::voting(remaining));
                match open {
                    None => {
                        assert_eq!(remaining, DURATION, "round opened mid-countdown");
                        rounds = rounds.saturating_add(1);
                    }
                    Some(previous) => {
                        assert_eq!(remaining.checked_add(1), Some(previous), "tick skipped");
                    }
                }
                open = Some(remaining);
                just_closed = false;
            }
        }

        assert!(open.is_none());
        assert!(rounds > 0);
        assert_eq!(rounds, starts);
        assert_eq!(closes, rounds);
        assert!(ends <= closes);
        // A vote is only ever counted inside an open round.
        assert_eq!(resolved, first_votes);
        assert_eq!(session.phase().await, SessionPhase::Idle);
    }

    #[test]
    fn move_shape_accepts_squares() {
        assert!(check_move_shape(&Move::new("e2", "e4")).is_ok());
        assert!(check_move_shape(&Move::new("a7", "a8q")).is_ok());
    }
}
