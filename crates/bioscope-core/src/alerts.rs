//! Performance alert generation
//!
//! Bands live metrics (startup latency, rebuffering, memory pressure,
//! network drops) against configurable thresholds and emits one alert
//! per breach occurrence. While a condition persists at the same
//! severity no further alerts fire; escalation or recovery re-arms the
//! metric.

use crate::clock::TimeSource;
use crate::error::{Error, Result};
use crate::types::{MemoryPressure, NetworkQuality, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

/// Alert severity, ordered least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "info"),
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// The metric an alert is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    StartupLatency,
    Rebuffering,
    MemoryPressure,
    NetworkDegraded,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::StartupLatency => write!(f, "startup_latency"),
            AlertKind::Rebuffering => write!(f, "rebuffering"),
            AlertKind::MemoryPressure => write!(f, "memory_pressure"),
            AlertKind::NetworkDegraded => write!(f, "network_degraded"),
        }
    }
}

/// A single emitted alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceAlert {
    pub id: Uuid,
    pub session_id: SessionId,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub suggestion: Option<String>,
}

/// Threshold bands per metric, validated at construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceThresholds {
    /// Startup latency above this is a warning (seconds)
    pub startup_warning_secs: f64,
    /// Startup latency above this is critical (seconds)
    pub startup_critical_secs: f64,
    /// Rebuffer ratio above this is a warning
    pub rebuffer_ratio_warning: f64,
    /// Rebuffer ratio above this is critical
    pub rebuffer_ratio_critical: f64,
    /// Stalls per minute above this is a warning
    pub rebuffer_events_warning: usize,
    /// Stalls per minute above this is critical
    pub rebuffer_events_critical: usize,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            startup_warning_secs: 2.0,
            startup_critical_secs: 5.0,
            rebuffer_ratio_warning: 0.05,
            rebuffer_ratio_critical: 0.15,
            rebuffer_events_warning: 2,
            rebuffer_events_critical: 5,
        }
    }
}

impl PerformanceThresholds {
    /// Tighter bands for latency-sensitive streaming surfaces
    pub fn strict_streaming() -> Self {
        Self {
            startup_warning_secs: 1.0,
            startup_critical_secs: 3.0,
            rebuffer_ratio_warning: 0.02,
            rebuffer_ratio_critical: 0.08,
            rebuffer_events_warning: 1,
            rebuffer_events_critical: 3,
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, ratio) in [
            ("rebuffer_ratio_warning", self.rebuffer_ratio_warning),
            ("rebuffer_ratio_critical", self.rebuffer_ratio_critical),
        ] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(Error::config(format!(
                    "{name} must be in [0, 1], got {ratio}"
                )));
            }
        }
        if self.startup_warning_secs >= self.startup_critical_secs {
            return Err(Error::config(
                "startup warning threshold must be below critical".to_string(),
            ));
        }
        if self.rebuffer_ratio_warning >= self.rebuffer_ratio_critical {
            return Err(Error::config(
                "rebuffer ratio warning threshold must be below critical".to_string(),
            ));
        }
        if self.rebuffer_events_warning >= self.rebuffer_events_critical {
            return Err(Error::config(
                "rebuffer event warning threshold must be below critical".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bands metrics into alerts, deduplicated per breach
pub struct AlertGenerator {
    session_id: SessionId,
    thresholds: PerformanceThresholds,
    clock: TimeSource,
    last_severity: HashMap<AlertKind, AlertSeverity>,
    alert_tx: broadcast::Sender<PerformanceAlert>,
}

impl AlertGenerator {
    /// Create a generator; rejects misconfigured thresholds
    pub fn new(
        session_id: SessionId,
        thresholds: PerformanceThresholds,
        clock: TimeSource,
    ) -> Result<Self> {
        thresholds.validate()?;
        let (alert_tx, _) = broadcast::channel(64);
        Ok(Self {
            session_id,
            thresholds,
            clock,
            last_severity: HashMap::new(),
            alert_tx,
        })
    }

    /// Subscribe to emitted alerts (event stream, no replay)
    pub fn subscribe(&self) -> broadcast::Receiver<PerformanceAlert> {
        self.alert_tx.subscribe()
    }

    /// Band a completed startup measurement
    pub fn evaluate_startup(&mut self, ttff_secs: f64) -> Option<PerformanceAlert> {
        let severity = if ttff_secs >= self.thresholds.startup_critical_secs {
            Some(AlertSeverity::Critical)
        } else if ttff_secs >= self.thresholds.startup_warning_secs {
            Some(AlertSeverity::Warning)
        } else {
            None
        };

        self.emit_if_changed(
            AlertKind::StartupLatency,
            severity,
            format!("startup took {ttff_secs:.1}s"),
            Some("lower the initial bitrate or shrink the startup buffer".to_string()),
        )
    }

    /// Band the current rebuffering picture (ratio plus recent count)
    pub fn evaluate_rebuffering(
        &mut self,
        ratio: f64,
        events_last_minute: usize,
    ) -> Option<PerformanceAlert> {
        let ratio_severity = if ratio >= self.thresholds.rebuffer_ratio_critical {
            Some(AlertSeverity::Critical)
        } else if ratio >= self.thresholds.rebuffer_ratio_warning {
            Some(AlertSeverity::Warning)
        } else {
            None
        };
        let count_severity = if events_last_minute >= self.thresholds.rebuffer_events_critical {
            Some(AlertSeverity::Critical)
        } else if events_last_minute >= self.thresholds.rebuffer_events_warning {
            Some(AlertSeverity::Warning)
        } else {
            None
        };

        let severity = ratio_severity.max(count_severity);

        self.emit_if_changed(
            AlertKind::Rebuffering,
            severity,
            format!(
                "rebuffering at {:.1}% of playback, {events_last_minute} stalls in the last minute",
                ratio * 100.0
            ),
            Some("downgrade the bitrate to protect playback".to_string()),
        )
    }

    /// Band a memory pressure sample
    pub fn evaluate_memory_pressure(
        &mut self,
        pressure: MemoryPressure,
    ) -> Option<PerformanceAlert> {
        let severity = match pressure {
            MemoryPressure::Normal => None,
            MemoryPressure::Warning => Some(AlertSeverity::Warning),
            MemoryPressure::Critical => Some(AlertSeverity::Critical),
        };

        self.emit_if_changed(
            AlertKind::MemoryPressure,
            severity,
            format!("memory pressure is {pressure}"),
            Some("release caches and shrink playback buffers".to_string()),
        )
    }

    /// Band a network quality change; only degradations alert
    pub fn evaluate_network_change(
        &mut self,
        from: NetworkQuality,
        to: NetworkQuality,
    ) -> Option<PerformanceAlert> {
        let severity = if to >= from {
            // Improvement or no change clears the breach
            None
        } else {
            match to {
                NetworkQuality::Offline => Some(AlertSeverity::Critical),
                NetworkQuality::Poor => Some(AlertSeverity::Warning),
                _ => Some(AlertSeverity::Info),
            }
        };

        self.emit_if_changed(
            AlertKind::NetworkDegraded,
            severity,
            format!("network quality dropped from {from} to {to}"),
            Some("expect a lower bitrate until the connection recovers".to_string()),
        )
    }

    /// Forget breach state, for reuse across sessions
    pub fn reset(&mut self) {
        self.last_severity.clear();
    }

    fn emit_if_changed(
        &mut self,
        kind: AlertKind,
        severity: Option<AlertSeverity>,
        message: String,
        suggestion: Option<String>,
    ) -> Option<PerformanceAlert> {
        let Some(severity) = severity else {
            // Back below the acceptable band: re-arm the metric
            self.last_severity.remove(&kind);
            return None;
        };

        if self.last_severity.get(&kind) == Some(&severity) {
            return None;
        }
        self.last_severity.insert(kind, severity);

        let alert = PerformanceAlert {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            kind,
            severity,
            timestamp: (self.clock)(),
            message,
            suggestion,
        };

        info!(kind = %kind, severity = %severity, message = %alert.message, "performance alert");
        let _ = self.alert_tx.send(alert.clone());

        Some(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::system_time_source;

    fn generator() -> AlertGenerator {
        AlertGenerator::new(
            SessionId::new(),
            PerformanceThresholds::default(),
            system_time_source(),
        )
        .unwrap()
    }

    #[test]
    fn test_startup_banding() {
        let mut g = generator();

        assert!(g.evaluate_startup(1.0).is_none());

        let alert = g.evaluate_startup(3.0).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert_eq!(alert.kind, AlertKind::StartupLatency);

        g.reset();
        let alert = g.evaluate_startup(6.0).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_persistent_breach_alerts_once() {
        let mut g = generator();

        assert!(g.evaluate_startup(3.0).is_some());
        // Same band again: deduplicated
        assert!(g.evaluate_startup(3.2).is_none());
        // Escalation fires a new alert
        let alert = g.evaluate_startup(7.0).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        // Recovery re-arms, so the next breach alerts again
        assert!(g.evaluate_startup(0.5).is_none());
        assert!(g.evaluate_startup(3.0).is_some());
    }

    #[test]
    fn test_rebuffering_uses_worst_of_ratio_and_count() {
        let mut g = generator();

        // Ratio warning only
        let alert = g.evaluate_rebuffering(0.06, 0).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);

        // Count pushes severity to critical even with a modest ratio
        let alert = g.evaluate_rebuffering(0.06, 5).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);

        g.reset();
        assert!(g.evaluate_rebuffering(0.01, 0).is_none());
    }

    #[test]
    fn test_memory_pressure_banding() {
        let mut g = generator();

        assert!(g.evaluate_memory_pressure(MemoryPressure::Normal).is_none());
        let alert = g
            .evaluate_memory_pressure(MemoryPressure::Critical)
            .unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_network_degradation_alerts() {
        let mut g = generator();

        let alert = g
            .evaluate_network_change(NetworkQuality::Good, NetworkQuality::Offline)
            .unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);

        g.reset();
        let alert = g
            .evaluate_network_change(NetworkQuality::Good, NetworkQuality::Poor)
            .unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);

        g.reset();
        let alert = g
            .evaluate_network_change(NetworkQuality::Excellent, NetworkQuality::Fair)
            .unwrap();
        assert_eq!(alert.severity, AlertSeverity::Info);

        // Improvements never alert
        assert!(g
            .evaluate_network_change(NetworkQuality::Poor, NetworkQuality::Good)
            .is_none());
    }

    #[test]
    fn test_strict_preset_is_tighter() {
        let strict = PerformanceThresholds::strict_streaming();
        let default = PerformanceThresholds::default();

        assert!(strict.startup_warning_secs < default.startup_warning_secs);
        assert!(strict.rebuffer_ratio_critical < default.rebuffer_ratio_critical);

        let mut g = AlertGenerator::new(SessionId::new(), strict, system_time_source()).unwrap();
        // 1.5s is fine by default thresholds but a warning under strict
        let alert = g.evaluate_startup(1.5).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);
    }

    #[test]
    fn test_misconfigured_thresholds_rejected() {
        let mut bad = PerformanceThresholds::default();
        bad.rebuffer_ratio_warning = 1.4;
        assert!(AlertGenerator::new(SessionId::new(), bad, system_time_source()).is_err());

        let mut inverted = PerformanceThresholds::default();
        inverted.startup_warning_secs = 9.0;
        assert!(AlertGenerator::new(SessionId::new(), inverted, system_time_source()).is_err());
    }

    #[tokio::test]
    async fn test_alerts_are_broadcast() {
        let mut g = generator();
        let mut rx = g.subscribe();

        g.evaluate_startup(6.0).unwrap();

        let alert = rx.recv().await.unwrap();
        assert_eq!(alert.kind, AlertKind::StartupLatency);
        assert_eq!(alert.severity, AlertSeverity::Critical);
    }
}
