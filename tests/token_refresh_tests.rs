use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use mockall::mock;
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scrobble_skipper::{
    Clock, CredentialManager, Player, SkipperError, SpotifyPlayer, TokenEndpoint, TokenGrant,
};

mock! {
    pub Accounts {}
    #[async_trait]
    impl TokenEndpoint for Accounts {
        async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, SkipperError>;
    }
}

// Clock the tests can move forward
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            Utc.with_ymd_and_hms(2025, 10, 24, 12, 0, 0).unwrap(),
        )))
    }

    fn advance(&self, by: TimeDelta) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

fn grant(token: &str) -> TokenGrant {
    TokenGrant {
        access_token: token.to_string(),
        expires_in: Duration::from_secs(3600),
    }
}

fn rejected() -> SkipperError {
    SkipperError::RefreshRejected {
        status: 400,
        body: r#"{"error":"invalid_grant"}"#.to_string(),
    }
}

fn manager(accounts: MockAccounts, clock: Arc<ManualClock>) -> CredentialManager {
    CredentialManager::new(
        Arc::new(accounts),
        "long-lived-refresh",
        Duration::from_secs(100),
        clock,
    )
}

// The first call refreshes, later calls reuse the cached token
#[tokio::test]
async fn test_token_is_cached_until_margin() {
    let clock = ManualClock::new();
    let issued = Arc::new(AtomicUsize::new(0));
    let issued_clone = issued.clone();

    let mut accounts = MockAccounts::new();
    accounts
        .expect_refresh()
        .withf(|refresh_token: &str| refresh_token == "long-lived-refresh")
        .times(2)
        .returning(move |_| {
            let n = issued_clone.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(grant(&format!("access-{n}")))
        });

    let credentials = manager(accounts, clock.clone());

    assert_eq!(credentials.valid_access_token().await.unwrap(), "access-1");
    clock.advance(TimeDelta::seconds(3000));
    assert_eq!(credentials.valid_access_token().await.unwrap(), "access-1");

    // 3500s after issue: inside the 100s margin before expiry
    clock.advance(TimeDelta::seconds(500));
    assert_eq!(credentials.valid_access_token().await.unwrap(), "access-2");
    assert_eq!(issued.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_refresh_failure_is_reported_and_retried() {
    let clock = ManualClock::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();

    let mut accounts = MockAccounts::new();
    accounts.expect_refresh().times(2).returning(move |_| {
        if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(rejected())
        } else {
            Ok(grant("access-ok"))
        }
    });

    let credentials = manager(accounts, clock);

    let err = credentials.valid_access_token().await.unwrap_err();
    assert!(err.is_auth_failure());
    match err {
        SkipperError::TokenRefreshFailed(inner) => {
            assert!(matches!(*inner, SkipperError::RefreshRejected { status: 400, .. }))
        }
        other => panic!("Expected TokenRefreshFailed, got {:?}", other),
    }

    // A failed refresh leaves nothing cached, so the next call tries again
    assert_eq!(credentials.valid_access_token().await.unwrap(), "access-ok");
}

#[tokio::test]
async fn test_invalidate_forces_refresh() {
    let clock = ManualClock::new();
    let mut accounts = MockAccounts::new();
    accounts
        .expect_refresh()
        .times(2)
        .returning(|_| Ok(grant("access")));

    let credentials = manager(accounts, clock);
    credentials.valid_access_token().await.unwrap();
    credentials.invalidate().await;
    credentials.valid_access_token().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let clock = ManualClock::new();
    let mut accounts = MockAccounts::new();
    accounts
        .expect_refresh()
        .times(1)
        .returning(|_| Ok(grant("shared")));

    let credentials = Arc::new(manager(accounts, clock));
    let (a, b) = tokio::join!(
        credentials.valid_access_token(),
        credentials.valid_access_token()
    );
    assert_eq!(a.unwrap(), "shared");
    assert_eq!(b.unwrap(), "shared");
}

// Authenticated playback calls fail with the auth error before touching the network
#[tokio::test]
async fn test_player_calls_fail_when_refresh_fails() {
    let clock = ManualClock::new();
    let mut accounts = MockAccounts::new();
    accounts.expect_refresh().times(2).returning(|_| Err(rejected()));

    let credentials = Arc::new(manager(accounts, clock));
    let player = SpotifyPlayer::new(Arc::new(Client::new()), credentials)
        .with_api_base("http://127.0.0.1:9/v1");

    let err = player.current_track().await.unwrap_err();
    assert!(matches!(err, SkipperError::TokenRefreshFailed(_)));

    let err = player.skip().await.unwrap_err();
    assert!(err.is_auth_failure());
}
