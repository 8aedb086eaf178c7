//! Adaptive buffer sizing
//!
//! Chooses a buffer posture from memory pressure and network quality.
//! Memory always wins: a device under pressure gets a small buffer no
//! matter how fast the network is.

use crate::types::{BufferConfiguration, BufferStrategy, MemoryPressure, MemoryState, NetworkQuality};
use tokio::sync::watch;
use tracing::debug;

/// Picks buffer configurations from pressure signals
///
/// Every update recomputes and republishes the configuration, even when
/// it is unchanged; consumers that care filter duplicates by equality.
pub struct AdaptiveBufferManager {
    memory_pressure: MemoryPressure,
    network_quality: NetworkQuality,
    strategy: BufferStrategy,
    config_tx: watch::Sender<BufferConfiguration>,
}

impl AdaptiveBufferManager {
    /// Start with normal memory on a fair network (balanced posture)
    pub fn new() -> Self {
        let memory_pressure = MemoryPressure::Normal;
        let network_quality = NetworkQuality::Fair;
        let strategy = Self::determine_strategy(memory_pressure, network_quality);
        let (config_tx, _) = watch::channel(strategy.configuration());

        Self {
            memory_pressure,
            network_quality,
            strategy,
            config_tx,
        }
    }

    /// Map pressure signals to a posture
    ///
    /// Memory pressure is evaluated first and overrides the network;
    /// only normal-memory devices get network-driven sizing.
    pub fn determine_strategy(
        memory: MemoryPressure,
        network: NetworkQuality,
    ) -> BufferStrategy {
        match memory {
            MemoryPressure::Critical => BufferStrategy::Minimal,
            MemoryPressure::Warning => BufferStrategy::Conservative,
            MemoryPressure::Normal => match network {
                NetworkQuality::Offline | NetworkQuality::Poor => BufferStrategy::Conservative,
                NetworkQuality::Fair => BufferStrategy::Balanced,
                NetworkQuality::Good | NetworkQuality::Excellent => BufferStrategy::Aggressive,
            },
        }
    }

    /// Feed a memory sample; recomputes and republishes
    pub fn update_memory_state(&mut self, state: &MemoryState) {
        self.memory_pressure = state.pressure;
        self.reevaluate();
    }

    /// Feed a network quality change; recomputes and republishes
    pub fn update_network_quality(&mut self, quality: NetworkQuality) {
        self.network_quality = quality;
        self.reevaluate();
    }

    fn reevaluate(&mut self) {
        self.strategy = Self::determine_strategy(self.memory_pressure, self.network_quality);
        let configuration = self.strategy.configuration();

        debug!(
            memory = %self.memory_pressure,
            network = %self.network_quality,
            strategy = %self.strategy,
            forward_seconds = configuration.preferred_forward_duration,
            "buffer configuration updated"
        );

        self.config_tx.send_replace(configuration);
    }

    /// Current posture
    pub fn current_strategy(&self) -> BufferStrategy {
        self.strategy
    }

    /// Current configuration snapshot
    pub fn current_configuration(&self) -> BufferConfiguration {
        *self.config_tx.borrow()
    }

    /// Subscribe to configuration updates (latest value semantics)
    pub fn subscribe(&self) -> watch::Receiver<BufferConfiguration> {
        self.config_tx.subscribe()
    }
}

impl Default for AdaptiveBufferManager {
    fn default() -> Self {
        Self::new()
    }
}
