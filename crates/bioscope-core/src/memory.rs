//! Memory pressure monitoring
//!
//! Samples system memory through a platform reader seam and classifies
//! the usage ratio into pressure bands. Every sample is published, not
//! only changes; downstream deduplication is the consumer's business.

use crate::error::{Error, Result};
use crate::types::{MemoryPressure, MemoryState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Raw reading from the platform memory adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub available_bytes: u64,
    pub used_bytes: u64,
}

/// Platform seam for the memory syscall adapter
pub trait MemoryReader: Send + Sync {
    fn read(&self) -> MemorySample;
}

/// Usage-ratio bands separating Normal / Warning / Critical
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryThresholds {
    /// Usage ratio at which pressure becomes Warning
    pub warning_ratio: f64,
    /// Usage ratio at which pressure becomes Critical
    pub critical_ratio: f64,
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            warning_ratio: 0.70,
            critical_ratio: 0.85,
        }
    }
}

impl MemoryThresholds {
    /// Create validated thresholds: `0 < warning < critical <= 1`
    pub fn new(warning_ratio: f64, critical_ratio: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&warning_ratio) || !(0.0..=1.0).contains(&critical_ratio) {
            return Err(Error::config(format!(
                "memory thresholds must be in [0, 1], got warning={warning_ratio} critical={critical_ratio}"
            )));
        }
        if warning_ratio >= critical_ratio {
            return Err(Error::config(format!(
                "warning threshold {warning_ratio} must be below critical threshold {critical_ratio}"
            )));
        }
        Ok(Self {
            warning_ratio,
            critical_ratio,
        })
    }

    /// Band a usage ratio
    pub fn classify(&self, usage_ratio: f64) -> MemoryPressure {
        if usage_ratio >= self.critical_ratio {
            MemoryPressure::Critical
        } else if usage_ratio >= self.warning_ratio {
            MemoryPressure::Warning
        } else {
            MemoryPressure::Normal
        }
    }
}

/// Monitor configuration
#[derive(Debug, Clone, Copy)]
pub struct MemoryMonitorConfig {
    /// How often the poll loop samples
    pub poll_interval: Duration,
    pub thresholds: MemoryThresholds,
}

impl Default for MemoryMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            thresholds: MemoryThresholds::default(),
        }
    }
}

/// Periodic memory sampler
pub struct MemoryMonitor {
    reader: Arc<dyn MemoryReader>,
    config: MemoryMonitorConfig,
    state_tx: Arc<watch::Sender<MemoryState>>,
    poll_task: Option<JoinHandle<()>>,
}

impl MemoryMonitor {
    /// Create a monitor; takes one synchronous sample for the initial
    /// published state
    pub fn new(reader: Arc<dyn MemoryReader>, config: MemoryMonitorConfig) -> Self {
        let initial = classify_sample(reader.read(), &config.thresholds);
        let (state_tx, _) = watch::channel(initial);

        Self {
            reader,
            config,
            state_tx: Arc::new(state_tx),
            poll_task: None,
        }
    }

    /// Take and publish one sample immediately
    pub fn sample(&self) -> MemoryState {
        let state = classify_sample(self.reader.read(), &self.config.thresholds);
        debug!(
            used = state.used_bytes,
            available = state.available_bytes,
            pressure = %state.pressure,
            "memory sampled"
        );
        self.state_tx.send_replace(state);
        state
    }

    /// Start the poll loop; restarting replaces the previous loop
    pub fn start(&mut self) {
        self.stop();

        let reader = Arc::clone(&self.reader);
        let thresholds = self.config.thresholds;
        let state_tx = Arc::clone(&self.state_tx);
        let poll_interval = self.config.poll_interval;

        self.poll_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            // The immediate first tick duplicates the constructor sample
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let state = classify_sample(reader.read(), &thresholds);
                if state.pressure >= MemoryPressure::Warning {
                    warn!(
                        used = state.used_bytes,
                        pressure = %state.pressure,
                        "memory pressure elevated"
                    );
                }
                state_tx.send_replace(state);
            }
        }));
    }

    /// Stop the poll loop
    pub fn stop(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }

    /// True while the poll loop is running
    pub fn is_running(&self) -> bool {
        self.poll_task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Latest published state
    pub fn current(&self) -> MemoryState {
        *self.state_tx.borrow()
    }

    /// Subscribe to samples (published on every sample, not on change)
    pub fn subscribe(&self) -> watch::Receiver<MemoryState> {
        self.state_tx.subscribe()
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn classify_sample(sample: MemorySample, thresholds: &MemoryThresholds) -> MemoryState {
    let mut state = MemoryState {
        available_bytes: sample.available_bytes,
        used_bytes: sample.used_bytes,
        pressure: MemoryPressure::Normal,
    };
    state.pressure = thresholds.classify(state.usage_ratio());
    state
}
