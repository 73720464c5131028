//! Bounded retry-with-backoff polling against a visibility check.
//!
//! The entity store is eventually consistent: a write is acknowledged before
//! it can be found by search. Capture therefore waits, checks, and backs off
//! until the write is observed or the attempt budget runs out. Time is taken
//! from an injected [`Clock`] so tests never wait on the wall clock.

use std::future::Future;
use std::time::Duration;

use dop_types::Clock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CaptureResult;

/// Delay schedule for visibility polling.
///
/// The first check runs after `initial_delay_ms`; each further check waits
/// `interval_ms * multiplier^(n-1)`, capped at `max_interval_ms`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backoff {
    pub initial_delay_ms: u64,
    pub interval_ms: u64,
    pub multiplier: f64,
    pub max_interval_ms: u64,
    /// Total number of checks. Zero is treated as one.
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay_ms: 3_000,
            interval_ms: 1_000,
            multiplier: 2.0,
            max_interval_ms: 8_000,
            max_attempts: 4,
        }
    }
}

impl Backoff {
    /// A single check after a fixed delay.
    pub fn once_after(delay: Duration) -> Self {
        Self {
            initial_delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Checks without any waiting, for callers that already know the write
    /// is visible.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            initial_delay_ms: 0,
            interval_ms: 0,
            multiplier: 1.0,
            max_interval_ms: 0,
            max_attempts,
        }
    }

    /// Number of checks actually performed.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// The wait before check number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(self.initial_delay_ms);
        }
        let factor = self.multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
        let scaled = (self.interval_ms as f64 * factor).min(self.max_interval_ms as f64);
        Duration::from_millis(scaled.max(0.0) as u64)
    }

    /// Sum of every wait in the schedule.
    pub fn total_delay(&self) -> Duration {
        (0..self.attempts()).map(|attempt| self.delay_for(attempt)).sum()
    }
}

/// Result of one visibility check.
#[derive(Clone, Debug, PartialEq)]
pub enum Visibility<T> {
    /// The expected state was observed.
    Visible(T),
    /// Not observed yet; try again after the next delay.
    NotYet,
    /// Observed something that waiting will not fix.
    Abandon(String),
}

/// Final result of [`poll_until`].
#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome<T> {
    Visible(T),
    /// Every attempt returned [`Visibility::NotYet`].
    Exhausted { attempts: u32 },
    Abandoned(String),
}

impl<T> PollOutcome<T> {
    pub fn into_visible(self) -> Option<T> {
        match self {
            Self::Visible(value) => Some(value),
            _ => None,
        }
    }
}

/// Run `check` on the backoff schedule until it reports a terminal result.
///
/// `check` receives the zero-based attempt number. Errors from `check` stop
/// polling and are returned as-is.
pub async fn poll_until<T, F, Fut>(
    clock: &dyn Clock,
    backoff: &Backoff,
    mut check: F,
) -> CaptureResult<PollOutcome<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = CaptureResult<Visibility<T>>>,
{
    let attempts = backoff.attempts();
    for attempt in 0..attempts {
        let delay = backoff.delay_for(attempt);
        if !delay.is_zero() {
            clock.sleep(delay).await;
        }
        match check(attempt).await? {
            Visibility::Visible(value) => return Ok(PollOutcome::Visible(value)),
            Visibility::Abandon(reason) => {
                debug!(attempt, reason = %reason, "visibility polling abandoned");
                return Ok(PollOutcome::Abandoned(reason));
            }
            Visibility::NotYet => debug!(attempt, "not visible yet"),
        }
    }
    Ok(PollOutcome::Exhausted { attempts })
}
