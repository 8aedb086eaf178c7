//! Rebuffering event tracking
//!
//! Records every stall as a closed `{start, end}` event and keeps a
//! running total, so bitrate and alerting decisions can read the stall
//! ratio and the recent stall frequency at any time.

use crate::clock::TimeSource;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A completed stall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebufferingEvent {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl RebufferingEvent {
    pub fn duration(&self) -> Duration {
        self.ended_at - self.started_at
    }
}

/// Tracks stalls over a playback session
///
/// Invariants: `total_duration` always equals the sum of recorded event
/// durations, and `is_buffering` exactly when a start is in flight.
pub struct RebufferingMonitor {
    clock: TimeSource,
    buffering_since: Option<DateTime<Utc>>,
    history: Vec<RebufferingEvent>,
    total_duration: Duration,
}

impl RebufferingMonitor {
    pub fn new(clock: TimeSource) -> Self {
        Self {
            clock,
            buffering_since: None,
            history: Vec::new(),
            total_duration: Duration::zero(),
        }
    }

    /// Open a stall; ignored if one is already open
    pub fn buffering_started(&mut self) {
        if self.buffering_since.is_some() {
            return;
        }
        let now = (self.clock)();
        self.buffering_since = Some(now);
        debug!(at = %now, "buffering started");
    }

    /// Close the in-flight stall and record it
    ///
    /// Returns `None` without touching totals when no stall is open.
    pub fn buffering_ended(&mut self) -> Option<RebufferingEvent> {
        let started_at = self.buffering_since.take()?;
        let ended_at = (self.clock)();
        let event = RebufferingEvent {
            started_at,
            ended_at,
        };

        self.total_duration += event.duration();
        self.history.push(event);

        debug!(
            duration_ms = event.duration().num_milliseconds(),
            total_ms = self.total_duration.num_milliseconds(),
            "buffering ended"
        );

        Some(event)
    }

    /// True while a stall is open
    pub fn is_buffering(&self) -> bool {
        self.buffering_since.is_some()
    }

    /// All recorded stalls, oldest first
    pub fn events(&self) -> &[RebufferingEvent] {
        &self.history
    }

    /// Number of recorded stalls
    pub fn event_count(&self) -> usize {
        self.history.len()
    }

    /// Accumulated stall time
    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    /// Stalls that started within the last 60 seconds (sliding window)
    pub fn events_in_last_minute(&self) -> usize {
        let cutoff = (self.clock)() - Duration::seconds(60);
        self.history
            .iter()
            .filter(|event| event.started_at >= cutoff)
            .count()
    }

    /// Total stall time as a fraction of total playback time
    pub fn rebuffer_ratio(&self, playback_duration: Duration) -> f64 {
        let playback_ms = playback_duration.num_milliseconds();
        if playback_ms <= 0 {
            return 0.0;
        }
        self.total_duration.num_milliseconds() as f64 / playback_ms as f64
    }

    /// Return to the freshly constructed state, for reuse across sessions
    pub fn reset(&mut self) {
        self.buffering_since = None;
        self.history.clear();
        self.total_duration = Duration::zero();
    }
}
