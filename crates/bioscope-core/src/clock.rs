//! Injectable time source
//!
//! Every component that timestamps or windows events takes a
//! [`TimeSource`] at construction instead of reading global time, so
//! transitions and measurements stay deterministic in tests.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex, PoisonError};

/// Shared time source closure
pub type TimeSource = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Production time source backed by the system clock
pub fn system_time_source() -> TimeSource {
    Arc::new(Utc::now)
}

/// Manually driven clock for tests and simulations
///
/// Time only moves when told to, so sliding windows and durations can be
/// asserted exactly.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at the given instant
    pub fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    /// Advance the clock by a duration
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    /// Current instant
    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build a [`TimeSource`] reading from this clock
    pub fn time_source(self: &Arc<Self>) -> TimeSource {
        let clock = Arc::clone(self);
        Arc::new(move || clock.now())
    }
}
