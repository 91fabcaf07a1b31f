use std::{env, fmt, time::Duration};

use chrono::TimeDelta;

use crate::SkipperError;

const DEFAULT_SKIP_WINDOW_DAYS: i64 = 60;
const MAX_SKIP_WINDOW_DAYS: i64 = 36_500;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 120;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TOKEN_REFRESH_MARGIN_SECS: u64 = 100;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Everything the agent needs, read once at startup.
///
/// Changing a value means restarting the process; nothing reloads at runtime.
#[derive(Clone)]
pub struct Settings {
    pub lastfm_username: String,
    pub lastfm_api_key: String,
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub spotify_refresh_token: String,
    pub skip_window: TimeDelta,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub token_refresh_margin: Duration,
    pub shutdown_grace: Duration,
}

impl Settings {
    /// Load from the process environment, reading a `.env` file first if present.
    pub fn from_env() -> Result<Self, SkipperError> {
        // optionally load .env
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SkipperError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // helper for mandatory strings
        let required = |var: &str| -> Result<String, SkipperError> {
            match lookup(var) {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => Err(SkipperError::Config(format!("{var} is missing or empty"))),
            }
        };

        // helper to parse an optional integer with a lower bound
        let number = |var: &str, default: u64, min: u64| -> Result<u64, SkipperError> {
            let Some(raw) = lookup(var) else {
                return Ok(default);
            };
            let value = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| SkipperError::Config(format!("{var}={raw:?} is not a number: {e}")))?;
            if value < min {
                return Err(SkipperError::Config(format!(
                    "{var} must be at least {min}, got {value}"
                )));
            }
            Ok(value)
        };

        let skip_window_days = number("SKIP_WINDOW_DAYS", DEFAULT_SKIP_WINDOW_DAYS as u64, 1)?;
        if skip_window_days > MAX_SKIP_WINDOW_DAYS as u64 {
            return Err(SkipperError::Config(format!(
                "SKIP_WINDOW_DAYS must be at most {MAX_SKIP_WINDOW_DAYS}, got {skip_window_days}"
            )));
        }

        Ok(Settings {
            lastfm_username: required("LASTFM_USERNAME")?,
            lastfm_api_key: required("LASTFM_API_KEY")?,
            spotify_client_id: required("SPOTIFY_CLIENT_ID")?,
            spotify_client_secret: required("SPOTIFY_CLIENT_SECRET")?,
            spotify_refresh_token: required("SPOTIFY_REFRESH_TOKEN")?,
            skip_window: TimeDelta::days(skip_window_days as i64),
            poll_interval: Duration::from_secs(number(
                "POLL_INTERVAL_SECONDS",
                DEFAULT_POLL_INTERVAL_SECS,
                1,
            )?),
            request_timeout: Duration::from_secs(number(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
                1,
            )?),
            token_refresh_margin: Duration::from_secs(number(
                "TOKEN_REFRESH_MARGIN_SECS",
                DEFAULT_TOKEN_REFRESH_MARGIN_SECS,
                0,
            )?),
            shutdown_grace: Duration::from_secs(number(
                "SHUTDOWN_GRACE_SECS",
                DEFAULT_SHUTDOWN_GRACE_SECS,
                0,
            )?),
        })
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("lastfm_username", &self.lastfm_username)
            .field("lastfm_api_key", &"<redacted>")
            .field("spotify_client_id", &self.spotify_client_id)
            .field("spotify_client_secret", &"<redacted>")
            .field("spotify_refresh_token", &"<redacted>")
            .field("skip_window", &self.skip_window)
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout", &self.request_timeout)
            .field("token_refresh_margin", &self.token_refresh_margin)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish()
    }
}
