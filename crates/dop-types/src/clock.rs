use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Time source used for timestamps and for waiting out the remote store's
/// eventual-consistency window.
///
/// Production code uses [`SystemClock`]; tests inject a [`ManualClock`] whose
/// `sleep` advances virtual time instantly.
#[async_trait]
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the calling task for `duration`.
    async fn sleep(&self, duration: Duration);

    /// The current instant as epoch milliseconds.
    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Wall-clock time backed by `tokio::time`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock for deterministic tests.
///
/// `sleep` never blocks: it moves the clock forward by the requested duration
/// and yields to the scheduler so other tasks can observe the new time.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Create a clock frozen at the given epoch milliseconds.
    ///
    /// Out-of-range values fall back to the UNIX epoch.
    pub fn at_epoch_ms(epoch_ms: i64) -> Self {
        Self::new(DateTime::from_timestamp_millis(epoch_ms).unwrap_or_default())
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
    }

    /// Jump to an absolute instant (may move backwards).
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().expect("clock lock poisoned") = instant;
    }

    /// Jump to an absolute epoch-millisecond instant.
    pub fn set_epoch_ms(&self, epoch_ms: i64) {
        self.set(DateTime::from_timestamp_millis(epoch_ms).unwrap_or_default());
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}
