//! Skips the track playing on a Spotify account when Last.fm shows it was
//! scrobbled within the configured window.
//!
//! The pieces, from the leaves up:
//!
//! - [`CredentialManager`] keeps a fresh Spotify access token, refreshing it
//!   lazily from the long-lived refresh token.
//! - [`SpotifyPlayer`] reads "currently playing" and sends "next".
//! - [`LastfmHistory`] finds the newest scrobble of an artist/title pair.
//! - [`SkipPolicy`] turns a track, the user's [`OverrideState`] and a history
//!   answer into a [`Decision`].
//! - [`Skipper`] runs the poll loop; a [`ControlHandle`] pauses, defers or
//!   stops it from another task.
//!
//! # Logging
//!
//! This library uses the `tracing` crate for logging. To see the logs, install
//! a subscriber in your application:
//!
//! ```no_run
//! use tracing::Level;
//! use tracing_subscriber::FmtSubscriber;
//!
//! let subscriber = FmtSubscriber::builder()
//!     .with_max_level(Level::DEBUG)
//!     .finish();
//!
//! tracing::subscriber::set_global_default(subscriber)
//!     .expect("Failed to set tracing subscriber");
//! ```
//!
//! - `INFO`: ticks that reach a decision, skips, override changes, token refreshes
//! - `WARN`: soft provider errors and failed history lookups
//! - `ERROR`: failed ticks
//! - `DEBUG`/`TRACE`: per-request and per-tick detail

pub mod clock;
pub use clock::{Clock, SystemClock};
pub mod control;
pub use control::{
    forward_control_lines, parse_control_line, ControlHandle, ControlSignal, ControlState,
};
pub mod credentials;
pub use credentials::{CredentialManager, SpotifyAccounts, TokenEndpoint, TokenGrant};
mod error;
pub use error::SkipperError;
mod events;
pub use events::SkipperEvent;
pub mod history;
pub use history::{HistoryLookup, LastfmHistory};
pub mod models;
pub use models::{Track, TrackIdentity};
pub mod playback;
pub use playback::{Player, SpotifyPlayer};
pub mod policy;
pub use policy::{Decision, Evaluation, OverrideState, SkipPolicy, SuppressReason};
mod poller;
pub use poller::{Skipper, TickOutcome};
mod settings;
pub use settings::Settings;
