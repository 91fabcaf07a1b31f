use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{TrackIdentity, TrackScrobblesResponse};
use crate::SkipperError;

pub const LASTFM_API_URL: &str = "https://ws.audioscrobbler.com/2.0/";

/// Scrobble history keyed by track name.
///
/// Implementations must swallow their own failures: `None` means "unknown",
/// and an unknown history must never lead to a skip.
#[async_trait]
pub trait HistoryLookup: Send + Sync {
    async fn last_played_at(&self, track: &TrackIdentity) -> Option<DateTime<Utc>>;
}

pub struct LastfmHistory {
    client: Arc<Client>,
    api_url: String,
    username: String,
    api_key: String,
}

impl LastfmHistory {
    pub fn new(client: Arc<Client>, username: &str, api_key: &str) -> Self {
        Self {
            client,
            api_url: LASTFM_API_URL.to_string(),
            username: username.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    /// Query `user.getTrackScrobbles` for the newest scrobble of `track`.
    pub async fn fetch_last_scrobble(
        &self,
        track: &TrackIdentity,
    ) -> Result<Option<DateTime<Utc>>, SkipperError> {
        let params = [
            ("method", "user.gettrackscrobbles"),
            ("user", self.username.as_str()),
            ("artist", track.artist()),
            ("track", track.title()),
            ("api_key", self.api_key.as_str()),
            ("format", "json"),
            ("limit", "1"),
        ];

        let response = self
            .client
            .get(&self.api_url)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SkipperError::HistoryLookup(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        parse_track_scrobbles(&body)
    }
}

/// Extract the newest scrobble timestamp from a `user.getTrackScrobbles` body.
pub fn parse_track_scrobbles(body: &str) -> Result<Option<DateTime<Utc>>, SkipperError> {
    let parsed: TrackScrobblesResponse = serde_json::from_str(body)?;
    if let Some(code) = parsed.error {
        return Err(SkipperError::HistoryLookup(format!(
            "Last.fm error {}: {}",
            code,
            parsed.message.as_deref().unwrap_or("no message")
        )));
    }
    Ok(parsed.latest_scrobble())
}

#[async_trait]
impl HistoryLookup for LastfmHistory {
    async fn last_played_at(&self, track: &TrackIdentity) -> Option<DateTime<Utc>> {
        match self.fetch_last_scrobble(track).await {
            Ok(last) => {
                debug!(%track, last_played = ?last, "History lookup finished");
                last
            }
            Err(e) => {
                warn!(%track, error = %e, "History lookup failed; treating as never played");
                None
            }
        }
    }
}
