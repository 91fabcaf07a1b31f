use std::error::Error;
use std::io;

use scrobble_skipper::SkipperError;

// Test SkipperError display implementation
#[test]
fn test_skipper_error_display() {
    let err = SkipperError::TokenExpired;
    assert_eq!(format!("{}", err), "Access token expired (HTTP 401)");

    let err = SkipperError::PlaybackRejected {
        status: 404,
        body: "NO_ACTIVE_DEVICE".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "Playback command rejected (HTTP 404): NO_ACTIVE_DEVICE"
    );

    let inner = SkipperError::RefreshRejected {
        status: 400,
        body: "invalid_grant".to_string(),
    };
    let err = SkipperError::TokenRefreshFailed(Box::new(inner));
    let shown = format!("{}", err);
    assert!(shown.starts_with("Token refresh failed"));
    assert!(shown.contains("invalid_grant"));

    let err = SkipperError::Config("LASTFM_API_KEY is missing or empty".to_string());
    assert_eq!(
        format!("{}", err),
        "Invalid configuration: LASTFM_API_KEY is missing or empty"
    );
}

// Test the error classification used by the poll loop
#[test]
fn test_error_classification() {
    let auth = [
        SkipperError::TokenExpired,
        SkipperError::RefreshRejected {
            status: 400,
            body: String::new(),
        },
        SkipperError::TokenRefreshFailed(Box::new(SkipperError::InvalidResponse(
            "empty".to_string(),
        ))),
    ];
    for err in &auth {
        assert!(err.is_auth_failure(), "{err} should be an auth failure");
        assert!(!err.is_playback_failure());
    }

    let playback = [
        SkipperError::PlaybackRejected {
            status: 429,
            body: String::new(),
        },
        SkipperError::InvalidResponse("?".to_string()),
    ];
    for err in &playback {
        assert!(err.is_playback_failure(), "{err} should be a playback failure");
        assert!(!err.is_auth_failure());
    }

    let history = SkipperError::HistoryLookup("HTTP 500".to_string());
    assert!(!history.is_auth_failure());
    assert!(!history.is_playback_failure());
}

// Test conversions to SkipperError
#[test]
fn test_skipper_error_conversions() {
    let io_err = io::Error::new(io::ErrorKind::Other, "Test IO error");
    let err: SkipperError = io_err.into();
    assert!(matches!(err, SkipperError::IoError(_)));

    let parse_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
    let err: SkipperError = parse_err.into();
    assert!(matches!(err, SkipperError::ParseFailed(_)));

    fn takes_error(_: &dyn Error) {}
    takes_error(&err);
}
