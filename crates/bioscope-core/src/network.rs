//! Network quality classification
//!
//! Raw `(bytes, duration)` transfer samples from the platform feed an
//! EWMA throughput estimate, which the monitor bands into a
//! [`NetworkQuality`]. Reachability from the path observer overrides
//! everything: unreachable is `Offline` no matter what the estimate
//! says.

use crate::clock::TimeSource;
use crate::types::NetworkQuality;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// A single observed transfer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandwidthSample {
    /// Bytes transferred
    pub bytes: usize,
    /// Time taken
    pub duration: Duration,
    /// When the sample was recorded
    pub timestamp: DateTime<Utc>,
}

impl BandwidthSample {
    /// Throughput in bits per second; zero-duration samples are zero
    pub fn throughput_bps(&self) -> u64 {
        if self.duration.as_secs_f64() > 0.0 {
            ((self.bytes as f64 * 8.0) / self.duration.as_secs_f64()) as u64
        } else {
            0
        }
    }
}

/// EWMA throughput estimator
pub struct BandwidthEstimator {
    clock: TimeSource,
    history: VecDeque<BandwidthSample>,
    max_history: usize,
    estimate_bps: u64,
}

impl BandwidthEstimator {
    /// EWMA smoothing factor
    const ALPHA: f64 = 0.2;

    pub fn new(clock: TimeSource) -> Self {
        Self {
            clock,
            history: VecDeque::with_capacity(20),
            max_history: 20,
            estimate_bps: 0,
        }
    }

    /// Record a transfer and return the updated estimate
    ///
    /// The first sample seeds the estimate directly.
    pub fn record_sample(&mut self, bytes: usize, duration: Duration) -> u64 {
        let sample = BandwidthSample {
            bytes,
            duration,
            timestamp: (self.clock)(),
        };

        if self.history.len() >= self.max_history {
            self.history.pop_front();
        }
        self.history.push_back(sample);

        let throughput = sample.throughput_bps();
        if self.estimate_bps == 0 {
            self.estimate_bps = throughput;
        } else {
            self.estimate_bps = ((self.estimate_bps as f64 * (1.0 - Self::ALPHA))
                + (throughput as f64 * Self::ALPHA)) as u64;
        }

        debug!(
            bytes,
            duration_ms = duration.as_millis(),
            throughput_mbps = throughput as f64 / 1_000_000.0,
            estimate_mbps = self.estimate_bps as f64 / 1_000_000.0,
            "bandwidth sample recorded"
        );

        self.estimate_bps
    }

    /// Current smoothed estimate in bits per second
    pub fn estimate_bps(&self) -> u64 {
        self.estimate_bps
    }

    /// Number of retained samples
    pub fn sample_count(&self) -> usize {
        self.history.len()
    }

    /// Discard history and estimate
    pub fn reset(&mut self) {
        self.history.clear();
        self.estimate_bps = 0;
    }
}

/// Classifies the bandwidth estimate into quality bands
pub struct NetworkQualityMonitor {
    estimator: BandwidthEstimator,
    reachable: bool,
    quality_tx: watch::Sender<NetworkQuality>,
}

impl NetworkQualityMonitor {
    /// Estimates below this are Poor
    pub const POOR_BELOW_BPS: u64 = 1_500_000;
    /// Estimates below this (and at least Poor) are Fair
    pub const FAIR_BELOW_BPS: u64 = 4_000_000;
    /// Estimates below this (and at least Fair) are Good
    pub const GOOD_BELOW_BPS: u64 = 10_000_000;

    /// Start reachable with no samples (classified Fair until measured)
    pub fn new(clock: TimeSource) -> Self {
        let (quality_tx, _) = watch::channel(NetworkQuality::Fair);
        Self {
            estimator: BandwidthEstimator::new(clock),
            reachable: true,
            quality_tx,
        }
    }

    /// Record a transfer, reclassify, and publish
    pub fn record_sample(&mut self, bytes: usize, duration: Duration) -> NetworkQuality {
        self.estimator.record_sample(bytes, duration);
        self.publish()
    }

    /// Reachability flag from the platform path observer
    pub fn set_reachable(&mut self, reachable: bool) -> NetworkQuality {
        self.reachable = reachable;
        self.publish()
    }

    fn publish(&self) -> NetworkQuality {
        let quality = self.classify();
        self.quality_tx.send_replace(quality);
        quality
    }

    fn classify(&self) -> NetworkQuality {
        if !self.reachable {
            return NetworkQuality::Offline;
        }
        if self.estimator.sample_count() == 0 {
            // Nothing measured yet: assume a middling connection
            return NetworkQuality::Fair;
        }
        match self.estimator.estimate_bps() {
            bps if bps < Self::POOR_BELOW_BPS => NetworkQuality::Poor,
            bps if bps < Self::FAIR_BELOW_BPS => NetworkQuality::Fair,
            bps if bps < Self::GOOD_BELOW_BPS => NetworkQuality::Good,
            _ => NetworkQuality::Excellent,
        }
    }

    /// Latest classification
    pub fn current_quality(&self) -> NetworkQuality {
        *self.quality_tx.borrow()
    }

    /// Smoothed throughput estimate
    pub fn estimate_bps(&self) -> u64 {
        self.estimator.estimate_bps()
    }

    /// Subscribe to quality updates (latest value semantics)
    pub fn subscribe(&self) -> watch::Receiver<NetworkQuality> {
        self.quality_tx.subscribe()
    }

    /// Return to construction state: reachable, unmeasured
    pub fn reset(&mut self) {
        self.estimator.reset();
        self.reachable = true;
        self.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::system_time_source;

    fn estimator() -> BandwidthEstimator {
        BandwidthEstimator::new(system_time_source())
    }

    fn monitor() -> NetworkQualityMonitor {
        NetworkQualityMonitor::new(system_time_source())
    }

    /// bytes that produce the given bps over one second
    fn bytes_for_bps(bps: u64) -> usize {
        (bps / 8) as usize
    }

    #[test]
    fn test_first_sample_seeds_estimate() {
        let mut e = estimator();
        let estimate = e.record_sample(bytes_for_bps(8_000_000), Duration::from_secs(1));
        assert_eq!(estimate, 8_000_000);
    }

    #[test]
    fn test_ewma_smooths_later_samples() {
        let mut e = estimator();
        e.record_sample(bytes_for_bps(10_000_000), Duration::from_secs(1));
        let estimate = e.record_sample(bytes_for_bps(5_000_000), Duration::from_secs(1));

        // 10M * 0.8 + 5M * 0.2 = 9M
        assert_eq!(estimate, 9_000_000);
    }

    #[test]
    fn test_zero_duration_sample_is_zero_throughput() {
        let sample = BandwidthSample {
            bytes: 1_000_000,
            duration: Duration::ZERO,
            timestamp: Utc::now(),
        };
        assert_eq!(sample.throughput_bps(), 0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut e = estimator();
        for _ in 0..50 {
            e.record_sample(1024, Duration::from_millis(100));
        }
        assert_eq!(e.sample_count(), 20);
    }

    #[test]
    fn test_classification_bands() {
        let mut m = monitor();

        assert_eq!(
            m.record_sample(bytes_for_bps(800_000), Duration::from_secs(1)),
            NetworkQuality::Poor
        );

        let mut m = monitor();
        assert_eq!(
            m.record_sample(bytes_for_bps(2_000_000), Duration::from_secs(1)),
            NetworkQuality::Fair
        );

        let mut m = monitor();
        assert_eq!(
            m.record_sample(bytes_for_bps(8_000_000), Duration::from_secs(1)),
            NetworkQuality::Good
        );

        let mut m = monitor();
        assert_eq!(
            m.record_sample(bytes_for_bps(20_000_000), Duration::from_secs(1)),
            NetworkQuality::Excellent
        );
    }

    #[test]
    fn test_unreachable_forces_offline() {
        let mut m = monitor();
        m.record_sample(bytes_for_bps(20_000_000), Duration::from_secs(1));
        assert_eq!(m.current_quality(), NetworkQuality::Excellent);

        assert_eq!(m.set_reachable(false), NetworkQuality::Offline);

        // Restoring reachability reclassifies from the estimate
        assert_eq!(m.set_reachable(true), NetworkQuality::Excellent);
    }

    #[test]
    fn test_unmeasured_network_is_fair() {
        let m = monitor();
        assert_eq!(m.current_quality(), NetworkQuality::Fair);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut m = monitor();
        m.record_sample(bytes_for_bps(20_000_000), Duration::from_secs(1));
        m.set_reachable(false);

        m.reset();

        assert_eq!(m.current_quality(), NetworkQuality::Fair);
        assert_eq!(m.estimate_bps(), 0);
    }
}
