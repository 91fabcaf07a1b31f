use crate::models::Track;
use crate::policy::{Decision, OverrideState};

// Notifications published by the poll loop for any observer (tray, tests)
#[derive(Debug, Clone)]
pub enum SkipperEvent {
    NowPlaying(Track),
    NothingPlaying,
    Decided { track: Track, decision: Decision },
    Skipped(Track),
    TickFailed(String),
    OverrideChanged(OverrideState),
    Stopped,
}

impl SkipperEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SkipperEvent::NowPlaying(_) => "nowPlaying",
            SkipperEvent::NothingPlaying => "nothingPlaying",
            SkipperEvent::Decided { .. } => "decided",
            SkipperEvent::Skipped(_) => "skipped",
            SkipperEvent::TickFailed(_) => "tickFailed",
            SkipperEvent::OverrideChanged(_) => "overrideChanged",
            SkipperEvent::Stopped => "stopped",
        }
    }
}
