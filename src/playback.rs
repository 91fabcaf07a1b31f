use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::credentials::CredentialManager;
use crate::models::{CurrentlyPlaying, Track};
use crate::SkipperError;

pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";

/// Read and control playback on the streaming account.
#[async_trait]
pub trait Player: Send + Sync {
    /// The track playing right now, or `None` when nothing usable is playing.
    async fn current_track(&self) -> Result<Option<Track>, SkipperError>;

    /// Advance to the next item in the user's queue.
    async fn skip(&self) -> Result<(), SkipperError>;
}

pub struct SpotifyPlayer {
    client: Arc<Client>,
    credentials: Arc<CredentialManager>,
    api_base: String,
}

impl SpotifyPlayer {
    pub fn new(client: Arc<Client>, credentials: Arc<CredentialManager>) -> Self {
        Self {
            client,
            credentials,
            api_base: SPOTIFY_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    async fn token_rejected(&self) -> SkipperError {
        warn!("Spotify rejected the access token (401); it will be refreshed next time.");
        self.credentials.invalidate().await;
        SkipperError::TokenExpired
    }
}

#[async_trait]
impl Player for SpotifyPlayer {
    async fn current_track(&self) -> Result<Option<Track>, SkipperError> {
        let token = self.credentials.valid_access_token().await?;

        let response = self
            .client
            .get(format!("{}/me/player/currently-playing", self.api_base))
            .query(&[("additional_types", "track")])
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                debug!("Nothing is playing (204).");
                Ok(None)
            }
            StatusCode::UNAUTHORIZED => Err(self.token_rejected().await),
            StatusCode::OK => {
                let body = response.text().await?;
                match serde_json::from_str::<CurrentlyPlaying>(&body) {
                    Ok(playing) => Ok(playing.into_track()),
                    Err(e) => {
                        warn!(error = %e, "Unreadable currently-playing payload; treating as nothing playing");
                        Ok(None)
                    }
                }
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), %body, "Unexpected currently-playing status");
                Ok(None)
            }
        }
    }

    async fn skip(&self) -> Result<(), SkipperError> {
        let token = self.credentials.valid_access_token().await?;

        let response = self
            .client
            .post(format!("{}/me/player/next", self.api_base))
            .bearer_auth(token)
            .header(CONTENT_LENGTH, "0")
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::ACCEPTED | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::UNAUTHORIZED => Err(self.token_rejected().await),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SkipperError::PlaybackRejected {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
