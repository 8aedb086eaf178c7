//! Startup latency measurement
//!
//! Tracks time-to-first-frame for a session. Platform callbacks can
//! arrive from any thread, so the tracker guards its measurement with a
//! mutex and applies single-writer-wins semantics: the first recorded
//! timestamp of each kind sticks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// One startup measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupMeasurement {
    /// When the content began loading
    pub load_started_at: DateTime<Utc>,
    /// When the first frame rendered, once known
    pub first_frame_at: Option<DateTime<Utc>>,
}

impl StartupMeasurement {
    /// Latency from load start to first frame; defined only when
    /// complete
    pub fn time_to_first_frame(&self) -> Option<Duration> {
        self.first_frame_at
            .map(|first_frame| first_frame - self.load_started_at)
    }

    /// True once the first frame has been recorded
    pub fn is_complete(&self) -> bool {
        self.first_frame_at.is_some()
    }
}

/// Thread-safe time-to-first-frame tracker
#[derive(Debug, Default)]
pub struct StartupTimeTracker {
    measurement: Mutex<Option<StartupMeasurement>>,
}

impl StartupTimeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the load start; ignored if one is already recorded
    pub fn record_load_start(&self, at: DateTime<Utc>) {
        let mut guard = self.lock();
        if guard.is_some() {
            return;
        }
        *guard = Some(StartupMeasurement {
            load_started_at: at,
            first_frame_at: None,
        });
        debug!(at = %at, "load start recorded");
    }

    /// Record the first frame; ignored without a load start or when a
    /// first frame is already recorded
    pub fn record_first_frame(&self, at: DateTime<Utc>) {
        let mut guard = self.lock();
        if let Some(measurement) = guard.as_mut() {
            if measurement.first_frame_at.is_none() {
                measurement.first_frame_at = Some(at);
                debug!(
                    ttff_ms = (at - measurement.load_started_at).num_milliseconds(),
                    "first frame recorded"
                );
            }
        }
    }

    /// Snapshot of the current measurement
    pub fn measurement(&self) -> Option<StartupMeasurement> {
        *self.lock()
    }

    /// Clear state entirely, for reuse across sessions
    pub fn reset(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<StartupMeasurement>> {
        self.measurement
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    #[test]
    fn test_ttff_requires_both_timestamps() {
        let tracker = StartupTimeTracker::new();
        assert!(tracker.measurement().is_none());

        tracker.record_load_start(t(0));
        let measurement = tracker.measurement().unwrap();
        assert!(!measurement.is_complete());
        assert!(measurement.time_to_first_frame().is_none());

        tracker.record_first_frame(t(3));
        let measurement = tracker.measurement().unwrap();
        assert!(measurement.is_complete());
        assert_eq!(
            measurement.time_to_first_frame(),
            Some(Duration::seconds(3))
        );
    }

    #[test]
    fn test_second_load_start_is_ignored() {
        let tracker = StartupTimeTracker::new();
        tracker.record_load_start(t(0));
        tracker.record_load_start(t(10));

        assert_eq!(tracker.measurement().unwrap().load_started_at, t(0));
    }

    #[test]
    fn test_first_frame_without_load_start_is_ignored() {
        let tracker = StartupTimeTracker::new();
        tracker.record_first_frame(t(5));
        assert!(tracker.measurement().is_none());
    }

    #[test]
    fn test_second_first_frame_is_ignored() {
        let tracker = StartupTimeTracker::new();
        tracker.record_load_start(t(0));
        tracker.record_first_frame(t(2));
        tracker.record_first_frame(t(9));

        assert_eq!(
            tracker.measurement().unwrap().time_to_first_frame(),
            Some(Duration::seconds(2))
        );
    }

    #[test]
    fn test_reset_clears_state() {
        let tracker = StartupTimeTracker::new();
        tracker.record_load_start(t(0));
        tracker.record_first_frame(t(1));

        tracker.reset();
        assert!(tracker.measurement().is_none());

        // A fresh measurement is accepted after reset
        tracker.record_load_start(t(20));
        assert_eq!(tracker.measurement().unwrap().load_started_at, t(20));
    }

    #[test]
    fn test_concurrent_load_starts_keep_exactly_one() {
        use std::sync::Arc;

        let tracker = Arc::new(StartupTimeTracker::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let tracker = Arc::clone(&tracker);
            handles.push(std::thread::spawn(move || {
                tracker.record_load_start(t(i));
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let recorded = tracker.measurement().unwrap().load_started_at;
        assert!((0..8).any(|i| recorded == t(i)));
    }
}
