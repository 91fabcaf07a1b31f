use chrono::{DateTime, TimeDelta, Utc};

use crate::history::HistoryLookup;
use crate::models::{Track, TrackIdentity};

/// User override of the automatic skip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OverrideState {
    /// Normal policy applies.
    #[default]
    Active,
    /// Nothing is skipped until the user resumes.
    PausedAll,
    /// The user deferred this one track; clears as soon as another is observed.
    SkippedThisTrack(TrackIdentity),
}

impl OverrideState {
    /// Pause/resume toggle. Pausing also drops a pending single-track deferral.
    pub fn toggle_pause(&self) -> OverrideState {
        match self {
            OverrideState::PausedAll => OverrideState::Active,
            OverrideState::Active | OverrideState::SkippedThisTrack(_) => OverrideState::PausedAll,
        }
    }

    /// Defer the automatic skip for `current`. Ignored while paused or when
    /// nothing is playing.
    pub fn defer(&self, current: Option<&TrackIdentity>) -> OverrideState {
        match (self, current) {
            (OverrideState::PausedAll, _) | (_, None) => self.clone(),
            (_, Some(track)) => OverrideState::SkippedThisTrack(track.clone()),
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, OverrideState::PausedAll)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    PausedAll,
    DeferredByUser,
}

/// First half of a decision: whether history needs to be consulted at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Nothing playing.
    Idle,
    Suppressed(SuppressReason),
    /// Look up this identity and call [`SkipPolicy::verdict`].
    Check(TrackIdentity),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Idle,
    Suppressed(SuppressReason),
    Skip { last_played: DateTime<Utc> },
    Keep { last_played: Option<DateTime<Utc>> },
}

impl Decision {
    pub fn is_skip(&self) -> bool {
        matches!(self, Decision::Skip { .. })
    }
}

/// The skip-window rule plus the override state machine. Holds no state of
/// its own, so every method returns the same answer for the same inputs.
#[derive(Debug, Clone, Copy)]
pub struct SkipPolicy {
    skip_window: TimeDelta,
}

impl SkipPolicy {
    pub fn new(skip_window: TimeDelta) -> Self {
        Self { skip_window }
    }

    pub fn skip_window(&self) -> TimeDelta {
        self.skip_window
    }

    /// Decide whether the current track must be checked, and compute the
    /// override state that follows from observing it.
    pub fn evaluate(
        &self,
        track: Option<&Track>,
        state: &OverrideState,
    ) -> (Evaluation, OverrideState) {
        let Some(track) = track else {
            return (Evaluation::Idle, state.clone());
        };
        let identity = track.identity();

        match state {
            OverrideState::PausedAll => (
                Evaluation::Suppressed(SuppressReason::PausedAll),
                state.clone(),
            ),
            OverrideState::SkippedThisTrack(deferred) if *deferred == identity => (
                Evaluation::Suppressed(SuppressReason::DeferredByUser),
                state.clone(),
            ),
            // A different track clears the deferral.
            OverrideState::SkippedThisTrack(_) => {
                (Evaluation::Check(identity), OverrideState::Active)
            }
            OverrideState::Active => (Evaluation::Check(identity), OverrideState::Active),
        }
    }

    /// Apply the window to a history answer. Exactly `skip_window` ago is kept.
    pub fn verdict(&self, last_played: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Decision {
        match last_played {
            Some(at) if now - at < self.skip_window => Decision::Skip { last_played: at },
            last_played => Decision::Keep { last_played },
        }
    }

    /// Full decision for one tick, consulting `history` only when needed.
    pub async fn decide(
        &self,
        track: Option<&Track>,
        state: &OverrideState,
        now: DateTime<Utc>,
        history: &dyn HistoryLookup,
    ) -> (Decision, OverrideState) {
        let (evaluation, next) = self.evaluate(track, state);
        let decision = match evaluation {
            Evaluation::Idle => Decision::Idle,
            Evaluation::Suppressed(reason) => Decision::Suppressed(reason),
            Evaluation::Check(identity) => {
                let last_played = history.last_played_at(&identity).await;
                self.verdict(last_played, now)
            }
        };
        (decision, next)
    }
}
