//! Time source for frame timestamps and delivery names.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync
{
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock
{
    fn now(&self) -> DateTime<Utc>
    {
        Utc::now()
    }
}

/// Deterministic clock that advances by a fixed step on every reading.
#[derive(Debug)]
pub struct StepClock
{
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl StepClock
{
    /// Clock starting at `start`, advancing `step` per reading.
    #[must_use]
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self
    {
        Self {
            next: Mutex::new(start),
            step,
        }
    }

    /// Clock frozen at `instant`.
    #[must_use]
    pub fn fixed(instant: DateTime<Utc>) -> Self
    {
        Self::new(instant, Duration::zero())
    }
}

impl Clock for StepClock
{
    fn now(&self) -> DateTime<Utc>
    {
        let mut next = self.next.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = *next;
        *next = now + self.step;
        now
    }
}

/// Seconds since the epoch with microsecond precision.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn microtime(instant: DateTime<Utc>) -> f64
{
    instant.timestamp() as f64 + f64::from(instant.timestamp_subsec_micros()) / 1_000_000.0
}
