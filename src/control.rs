use std::io::BufRead;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

use crate::events::SkipperEvent;
use crate::models::TrackIdentity;
use crate::policy::OverrideState;

// Signals the control surface can send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    TogglePause,
    SkipThisTrackOnly,
    Exit,
}

/// Map one line typed on the control input to a signal.
pub fn parse_control_line(line: &str) -> Option<ControlSignal> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" | "resume" => Some(ControlSignal::TogglePause),
        "s" | "skip" => Some(ControlSignal::SkipThisTrackOnly),
        "q" | "quit" | "exit" => Some(ControlSignal::Exit),
        _ => None,
    }
}

/// Feed control lines from a blocking reader into `control` until `Exit`,
/// end of input, or a read error.
///
/// Meant for a dedicated OS thread: a blocking read cannot be cancelled, and
/// a thread that is still parked in it does not hold up runtime shutdown.
pub fn forward_control_lines(input: impl BufRead, control: &ControlHandle) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Reading control input failed");
                return;
            }
        };
        match parse_control_line(&line) {
            Some(signal) => {
                control.send(signal);
                if signal == ControlSignal::Exit {
                    return;
                }
            }
            None if line.trim().is_empty() => {}
            None => warn!(input = %line.trim(), "Unknown command (p = pause/resume, s = skip this track, q = quit)"),
        }
    }
    debug!("Control input closed");
}

struct ControlInner {
    override_state: OverrideState,
    now_playing: Option<TrackIdentity>,
}

/// Override state shared between the poll loop and the control surface.
///
/// Every access is a short critical section on a plain mutex and never spans
/// an `.await`, so a reader only ever sees a fully applied transition.
#[derive(Clone)]
pub struct ControlState {
    inner: Arc<Mutex<ControlInner>>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ControlInner {
                override_state: OverrideState::Active,
                now_playing: None,
            })),
        }
    }

    // The inner data is always left consistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, ControlInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> OverrideState {
        self.lock().override_state.clone()
    }

    pub fn now_playing(&self) -> Option<TrackIdentity> {
        self.lock().now_playing.clone()
    }

    pub(crate) fn set_now_playing(&self, identity: Option<TrackIdentity>) {
        self.lock().now_playing = identity;
    }

    /// Replace the state with `next` only if it still equals `expected`.
    /// Returns false when a control event got there first.
    pub(crate) fn commit(&self, expected: &OverrideState, next: OverrideState) -> bool {
        let mut inner = self.lock();
        if inner.override_state != *expected {
            return false;
        }
        inner.override_state = next;
        true
    }

    /// Apply a user signal. Returns the new state when it changed.
    /// `Exit` is not a state transition and always returns `None`.
    pub fn apply(&self, signal: ControlSignal) -> Option<OverrideState> {
        let mut inner = self.lock();
        let next = match signal {
            ControlSignal::TogglePause => inner.override_state.toggle_pause(),
            ControlSignal::SkipThisTrackOnly => inner
                .override_state
                .defer(inner.now_playing.as_ref()),
            ControlSignal::Exit => return None,
        };
        if next == inner.override_state {
            return None;
        }
        inner.override_state = next.clone();
        Some(next)
    }
}

/// Cloneable handle handed to whatever drives the agent from outside.
#[derive(Clone)]
pub struct ControlHandle {
    pub(crate) state: ControlState,
    pub(crate) event_sender: broadcast::Sender<SkipperEvent>,
    pub(crate) stop_signal: Arc<AtomicBool>,
    pub(crate) shutdown_notify: Arc<Notify>,
}

impl ControlHandle {
    pub fn send(&self, signal: ControlSignal) {
        if signal == ControlSignal::Exit {
            self.exit();
            return;
        }
        match self.state.apply(signal) {
            Some(next) => {
                info!(?signal, override_state = ?next, "Override changed");
                let _ = self.event_sender.send(SkipperEvent::OverrideChanged(next));
            }
            None => debug!(?signal, "Control signal left the override unchanged"),
        }
    }

    pub fn toggle_pause(&self) {
        self.send(ControlSignal::TogglePause);
    }

    pub fn skip_this_track_only(&self) {
        self.send(ControlSignal::SkipThisTrackOnly);
    }

    /// Ask the poll loop to stop. Interrupts a tick in flight.
    pub fn exit(&self) {
        info!("Exit requested");
        self.stop_signal.store(true, Ordering::SeqCst);
        // notify_one keeps a permit if the loop is not waiting yet
        self.shutdown_notify.notify_one();
    }

    pub fn override_state(&self) -> OverrideState {
        self.state.snapshot()
    }

    pub fn is_stopping(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }
}
