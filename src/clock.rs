use chrono::{DateTime, Utc};

/// Time source used for token expiry and skip-window arithmetic.
///
/// Production code uses [`SystemClock`]; tests plug in a clock they can move.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
