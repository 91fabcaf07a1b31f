use reqwest::Client;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::control::{ControlHandle, ControlState};
use crate::credentials::{CredentialManager, SpotifyAccounts};
use crate::events::SkipperEvent;
use crate::history::{HistoryLookup, LastfmHistory};
use crate::models::Track;
use crate::playback::{Player, SpotifyPlayer};
use crate::policy::{Decision, Evaluation, SkipPolicy};
use crate::settings::Settings;
use crate::SkipperError;

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
// tokio's interval panics on a zero period
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What a single tick ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Decided(Decision),
    /// Same provider track as the last completed check; history not consulted.
    AlreadyChecked,
    /// A provider call failed; nothing was skipped.
    Failed(String),
}

/// The poll-decide-act loop.
///
/// Owns the providers and the policy; the override state lives in a
/// [`ControlState`] shared with every [`ControlHandle`].
pub struct Skipper {
    player: Arc<dyn Player>,
    history: Arc<dyn HistoryLookup>,
    policy: SkipPolicy,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    control: ControlState,
    event_sender: broadcast::Sender<SkipperEvent>,
    stop_signal: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
    // provider id of the last track whose decision was carried out
    last_checked: Mutex<Option<String>>,
}

impl Skipper {
    pub fn new(
        player: Arc<dyn Player>,
        history: Arc<dyn HistoryLookup>,
        policy: SkipPolicy,
        poll_interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if poll_interval < MIN_POLL_INTERVAL {
            warn!(
                requested_ms = poll_interval.as_millis() as u64,
                "Poll interval too short; using {}s",
                MIN_POLL_INTERVAL.as_secs()
            );
        }
        let (event_tx, _) = broadcast::channel(100);
        Self {
            player,
            history,
            policy,
            clock,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            control: ControlState::new(),
            event_sender: event_tx,
            stop_signal: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
            last_checked: Mutex::new(None),
        }
    }

    /// Wire the Spotify and Last.fm clients from startup settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, SkipperError> {
        let client = Arc::new(
            Client::builder()
                .pool_idle_timeout(Some(POOL_IDLE_TIMEOUT))
                .timeout(settings.request_timeout)
                .connect_timeout(settings.request_timeout)
                .build()?,
        );
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let accounts = SpotifyAccounts::new(
            client.clone(),
            &settings.spotify_client_id,
            &settings.spotify_client_secret,
        );
        let credentials = Arc::new(CredentialManager::new(
            Arc::new(accounts),
            &settings.spotify_refresh_token,
            settings.token_refresh_margin,
            clock.clone(),
        ));
        let player = SpotifyPlayer::new(client.clone(), credentials);
        let history = LastfmHistory::new(
            client,
            &settings.lastfm_username,
            &settings.lastfm_api_key,
        );

        Ok(Self::new(
            Arc::new(player),
            Arc::new(history),
            SkipPolicy::new(settings.skip_window),
            settings.poll_interval,
            clock,
        ))
    }

    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle {
            state: self.control.clone(),
            event_sender: self.event_sender.clone(),
            stop_signal: self.stop_signal.clone(),
            shutdown_notify: self.shutdown_notify.clone(),
        }
    }

    pub fn event_receiver(&self) -> broadcast::Receiver<SkipperEvent> {
        self.event_sender.subscribe()
    }

    pub fn policy(&self) -> &SkipPolicy {
        &self.policy
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[inline]
    fn send_event(&self, event: SkipperEvent) {
        // No subscribers is fine.
        let _ = self.event_sender.send(event);
    }

    fn last_checked(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.last_checked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one poll-decide-act cycle. Provider errors end the tick early and
    /// are reported in the outcome; they never propagate.
    pub async fn tick(&self) -> TickOutcome {
        let snapshot = self.control.snapshot();
        trace!(override_state = ?snapshot, "Tick started");

        let track = match self.player.current_track().await {
            Ok(track) => track,
            Err(e) => return self.fail("Reading current track failed", e),
        };

        self.control.set_now_playing(track.as_ref().map(Track::identity));
        let (evaluation, next) = self.policy.evaluate(track.as_ref(), &snapshot);
        if next != snapshot {
            if self.control.commit(&snapshot, next.clone()) {
                info!(override_state = ?next, "Override cleared by track change");
                self.send_event(SkipperEvent::OverrideChanged(next));
            } else {
                debug!("Override changed during the tick; keeping the user's state");
            }
        }

        let Some(track) = track else {
            debug!("Nothing is playing right now");
            self.last_checked().take();
            self.send_event(SkipperEvent::NothingPlaying);
            return TickOutcome::Decided(Decision::Idle);
        };
        self.send_event(SkipperEvent::NowPlaying(track.clone()));

        {
            // Any other track, even one only seen while suppressed, ends the memory
            let mut last_checked = self.last_checked();
            if last_checked.as_deref() != Some(track.provider_id.as_str()) {
                last_checked.take();
            }
        }

        let identity = match evaluation {
            Evaluation::Idle => return TickOutcome::Decided(Decision::Idle),
            Evaluation::Suppressed(reason) => {
                info!(%track, ?reason, "Skip suppressed by override");
                let decision = Decision::Suppressed(reason);
                self.send_event(SkipperEvent::Decided { track, decision });
                return TickOutcome::Decided(decision);
            }
            Evaluation::Check(identity) => identity,
        };

        if self.last_checked().as_deref() == Some(track.provider_id.as_str()) {
            debug!(%track, "Same track as last check; not looking it up again");
            return TickOutcome::AlreadyChecked;
        }

        info!(%track, "Checking scrobble history");
        let last_played = self.history.last_played_at(&identity).await;
        let mut decision = self.policy.verdict(last_played, self.clock.now());
        if decision.is_skip() {
            // The user may have paused or deferred while the lookup was in flight
            let (recheck, _) = self.policy.evaluate(Some(&track), &self.control.snapshot());
            if let Evaluation::Suppressed(reason) = recheck {
                info!(%track, ?reason, "Override changed during the lookup; not skipping");
                decision = Decision::Suppressed(reason);
                self.send_event(SkipperEvent::Decided { track, decision });
                return TickOutcome::Decided(decision);
            }
        }
        self.send_event(SkipperEvent::Decided {
            track: track.clone(),
            decision,
        });

        match decision {
            Decision::Skip { last_played } => {
                let days_ago = (self.clock.now() - last_played).num_days();
                info!(%track, %last_played, days_ago, "Played too recently; skipping");
                if let Err(e) = self.player.skip().await {
                    return self.fail("Skip command failed", e);
                }
                self.send_event(SkipperEvent::Skipped(track.clone()));
            }
            Decision::Keep {
                last_played: Some(last_played),
            } => {
                info!(%track, %last_played, "Last scrobble is outside the window; keeping");
            }
            _ => info!(%track, "No scrobble found; keeping"),
        }

        *self.last_checked() = Some(track.provider_id);
        TickOutcome::Decided(decision)
    }

    fn fail(&self, context: &str, e: SkipperError) -> TickOutcome {
        if e.is_auth_failure() {
            warn!(error = %e, "{}: credentials unavailable, retrying next tick", context);
        } else {
            error!(error = %e, "{}", context);
        }
        let message = format!("{context}: {e}");
        self.send_event(SkipperEvent::TickFailed(message.clone()));
        TickOutcome::Failed(message)
    }

    /// Tick every `poll_interval` until [`ControlHandle::exit`] is called.
    ///
    /// A tick that overruns delays the next one; ticks never overlap. The exit
    /// notification also cancels a tick that is still waiting on a provider.
    pub async fn run(&self) {
        info!(
            skip_window_days = self.policy.skip_window().num_days(),
            poll_interval_secs = self.poll_interval.as_secs(),
            "Auto-skipper running"
        );
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.stop_signal.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                biased;
                _ = self.shutdown_notify.notified() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = self.shutdown_notify.notified() => {
                    info!("Shutdown requested during a tick; abandoning it");
                    break;
                }
                outcome = self.tick() => trace!(?outcome, "Tick finished"),
            }
        }

        info!("Auto-skipper stopped");
        self.send_event(SkipperEvent::Stopped);
    }

    /// Move the loop onto its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}
