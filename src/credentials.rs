use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::models::TokenResponse;
use crate::SkipperError;

pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Outcome of a successful refresh exchange.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: Duration,
}

/// The provider endpoint that trades a refresh credential for an access token.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, SkipperError>;
}

/// Spotify accounts service, `grant_type=refresh_token` with client Basic auth.
pub struct SpotifyAccounts {
    client: Arc<Client>,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl SpotifyAccounts {
    pub fn new(client: Arc<Client>, client_id: &str, client_secret: &str) -> Self {
        Self {
            client,
            token_url: SPOTIFY_TOKEN_URL.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }

    pub fn with_token_url(mut self, token_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self
    }
}

#[async_trait]
impl TokenEndpoint for SpotifyAccounts {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, SkipperError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SkipperError::RefreshRejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let token: TokenResponse = serde_json::from_str(&body)?;
        if token.access_token.is_empty() {
            return Err(SkipperError::InvalidResponse(
                "Token response carried an empty access_token".to_string(),
            ));
        }
        if token.refresh_token.is_some() {
            // The configured refresh token stays authoritative.
            debug!("Token response included a rotated refresh token; ignoring it.");
        }

        Ok(TokenGrant {
            access_token: token.access_token,
            expires_in: Duration::from_secs(token.expires_in),
        })
    }
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Owns the access token for the playback provider and refreshes it on demand.
///
/// The check happens lazily inside [`valid_access_token`](Self::valid_access_token),
/// so a token nobody asks for is never refreshed. Concurrent callers queue on
/// the cache lock and share a single refresh.
pub struct CredentialManager {
    endpoint: Arc<dyn TokenEndpoint>,
    refresh_token: String,
    safety_margin: TimeDelta,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<CachedToken>>,
}

impl CredentialManager {
    pub fn new(
        endpoint: Arc<dyn TokenEndpoint>,
        refresh_token: &str,
        safety_margin: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            endpoint,
            refresh_token: refresh_token.to_string(),
            safety_margin: to_delta(safety_margin),
            clock,
            cached: Mutex::new(None),
        }
    }

    /// Return a usable access token, refreshing first if none is cached or the
    /// cached one is inside the safety margin.
    pub async fn valid_access_token(&self) -> Result<String, SkipperError> {
        let mut cached = self.cached.lock().await;
        let now = self.clock.now();

        if let Some(token) = cached.as_ref() {
            if now < token.expires_at - self.safety_margin {
                return Ok(token.access_token.clone());
            }
            debug!(expires_at = %token.expires_at, "Access token expired or about to expire.");
        }

        let grant = self
            .endpoint
            .refresh(&self.refresh_token)
            .await
            .map_err(|e| {
                error!(error = %e, "Access token refresh failed");
                SkipperError::TokenRefreshFailed(Box::new(e))
            })?;

        let expires_at = self.clock.now() + to_delta(grant.expires_in);
        info!(%expires_at, "Access token refreshed.");
        let access_token = grant.access_token.clone();
        *cached = Some(CachedToken {
            access_token: grant.access_token,
            expires_at,
        });
        Ok(access_token)
    }

    /// Forget the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.lock().await;
        if cached.take().is_some() {
            debug!("Cached access token invalidated.");
        }
    }
}

// Provider lifetimes are minutes to hours; clamp anything absurd to a day.
fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration.min(Duration::from_secs(86_400))).unwrap_or(TimeDelta::zero())
}
