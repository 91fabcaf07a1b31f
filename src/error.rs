use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkipperError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    ParseFailed(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Refresh credential rejected (HTTP {status}): {body}")]
    RefreshRejected { status: u16, body: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(Box<SkipperError>), // Box to avoid recursive type size issue

    #[error("Access token expired (HTTP 401)")]
    TokenExpired,

    #[error("Playback command rejected (HTTP {status}): {body}")]
    PlaybackRejected { status: u16, body: String },

    #[error("History lookup failed: {0}")]
    HistoryLookup(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task panicked or cancelled")]
    TaskJoinError(#[from] tokio::task::JoinError),
}

impl SkipperError {
    /// The credential could not be refreshed or the provider refused the
    /// bearer token. Fatal for the current tick only.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            SkipperError::TokenRefreshFailed(_)
                | SkipperError::RefreshRejected { .. }
                | SkipperError::TokenExpired
        )
    }

    /// The playback provider refused a read or a skip, or could not be reached.
    pub fn is_playback_failure(&self) -> bool {
        matches!(
            self,
            SkipperError::PlaybackRejected { .. }
                | SkipperError::RequestFailed(_)
                | SkipperError::ParseFailed(_)
                | SkipperError::InvalidResponse(_)
        )
    }
}
