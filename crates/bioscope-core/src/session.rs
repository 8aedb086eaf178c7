//! Streaming session - wires the decision engines together
//!
//! Owns one state machine plus the monitors and strategies around it,
//! and routes signals between them the way the platform adapters expect:
//! actions in, decisions and alert/config streams out. The session
//! serializes state machine access behind a mutex, so platform callers
//! can send from any task.

use crate::{
    alerts::{AlertGenerator, PerformanceAlert, PerformanceThresholds},
    bitrate::{BitrateAdjustment, BitrateStrategy, BitrateThresholds, ConservativeBitrateStrategy},
    buffer::AdaptiveBufferManager,
    clock::{system_time_source, TimeSource},
    cleanup::{ResourceCleaner, ResourceCleanupCoordinator},
    error::Result,
    network::NetworkQualityMonitor,
    rebuffering::RebufferingMonitor,
    startup::StartupTimeTracker,
    state_machine::{PlaybackAction, PlaybackState, PlaybackStateMachine, PlaybackTransition},
    types::{
        standard_ladder, BitrateLevel, BufferConfiguration, CleanupPriority, CleanupResult,
        MemoryState, NetworkQuality, SessionId,
    },
};
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{info, instrument};

/// Session configuration, validated at construction
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bitrate ladder offered by the content
    pub levels: Vec<BitrateLevel>,
    /// Conservative strategy tunables
    pub bitrate_thresholds: BitrateThresholds,
    /// Alert banding
    pub performance_thresholds: PerformanceThresholds,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            levels: standard_ladder(),
            bitrate_thresholds: BitrateThresholds::default(),
            performance_thresholds: PerformanceThresholds::default(),
        }
    }
}

/// One playback session's control core
pub struct StreamingSession {
    id: SessionId,
    clock: TimeSource,
    levels: Vec<BitrateLevel>,
    strategy: ConservativeBitrateStrategy,
    machine: Mutex<PlaybackStateMachine>,
    rebuffering: Mutex<RebufferingMonitor>,
    startup: StartupTimeTracker,
    buffer: Mutex<AdaptiveBufferManager>,
    network: Mutex<NetworkQualityMonitor>,
    cleanup: Mutex<ResourceCleanupCoordinator>,
    alerts: Mutex<AlertGenerator>,
}

impl StreamingSession {
    /// Create a session on the system clock
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::with_time_source(config, system_time_source())
    }

    /// Create a session with an injected time source
    pub fn with_time_source(config: SessionConfig, clock: TimeSource) -> Result<Self> {
        let id = SessionId::new();
        let strategy = ConservativeBitrateStrategy::with_thresholds(config.bitrate_thresholds)?;
        let alerts = AlertGenerator::new(id, config.performance_thresholds, clock.clone())?;

        info!(session_id = %id, levels = config.levels.len(), "streaming session created");

        Ok(Self {
            id,
            clock: clock.clone(),
            levels: config.levels,
            strategy,
            machine: Mutex::new(PlaybackStateMachine::new(clock.clone())),
            rebuffering: Mutex::new(RebufferingMonitor::new(clock.clone())),
            startup: StartupTimeTracker::new(),
            buffer: Mutex::new(AdaptiveBufferManager::new()),
            network: Mutex::new(NetworkQualityMonitor::new(clock)),
            cleanup: Mutex::new(ResourceCleanupCoordinator::new()),
            alerts: Mutex::new(alerts),
        })
    }

    /// Session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Feed an action through the state machine and side trackers
    ///
    /// Sends are serialized internally; ordering follows call order.
    #[instrument(skip(self))]
    pub async fn send(&self, action: PlaybackAction) -> Option<PlaybackTransition> {
        let transition = {
            let mut machine = self.machine.lock().await;
            machine.send(action.clone())
        };

        // Observational player events drive the startup tracker even
        // though the transition table rejects them.
        if matches!(action, PlaybackAction::StartedPlaying) {
            self.note_first_frame().await;
        }

        if let Some(transition) = &transition {
            self.apply_side_effects(transition).await;
        }

        transition
    }

    /// Pure lookup against the current state
    pub async fn can_perform(&self, action: &PlaybackAction) -> bool {
        self.machine.lock().await.can_perform(action)
    }

    /// Current playback state snapshot
    pub async fn state(&self) -> PlaybackState {
        self.machine.lock().await.state().clone()
    }

    /// Subscribe to the latest playback state
    pub async fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.machine.lock().await.subscribe_state()
    }

    /// Subscribe to transition events
    pub async fn subscribe_transitions(&self) -> broadcast::Receiver<PlaybackTransition> {
        self.machine.lock().await.subscribe_transitions()
    }

    /// Subscribe to buffer configuration updates
    pub async fn subscribe_buffer_configuration(&self) -> watch::Receiver<BufferConfiguration> {
        self.buffer.lock().await.subscribe()
    }

    /// Subscribe to network quality updates
    pub async fn subscribe_network_quality(&self) -> watch::Receiver<NetworkQuality> {
        self.network.lock().await.subscribe()
    }

    /// Subscribe to performance alerts
    pub async fn subscribe_alerts(&self) -> broadcast::Receiver<PerformanceAlert> {
        self.alerts.lock().await.subscribe()
    }

    /// Subscribe to cleanup result batches
    pub async fn subscribe_cleanup_results(&self) -> broadcast::Receiver<Vec<CleanupResult>> {
        self.cleanup.lock().await.subscribe()
    }

    /// Register a resource cleaner with the coordinator
    pub async fn register_cleaner(
        &self,
        cleaner: Arc<dyn ResourceCleaner>,
        priority: CleanupPriority,
    ) {
        self.cleanup.lock().await.register(cleaner, priority);
    }

    /// Feed a transfer sample from the platform network adapter
    pub async fn record_bandwidth_sample(&self, bytes: usize, duration: Duration) {
        let (previous, quality) = {
            let mut network = self.network.lock().await;
            let previous = network.current_quality();
            (previous, network.record_sample(bytes, duration))
        };

        if quality != previous {
            self.buffer.lock().await.update_network_quality(quality);
            self.alerts
                .lock()
                .await
                .evaluate_network_change(previous, quality);
        }
    }

    /// Feed a reachability change from the platform path observer
    pub async fn set_network_reachable(&self, reachable: bool) {
        let (previous, quality) = {
            let mut network = self.network.lock().await;
            let previous = network.current_quality();
            (previous, network.set_reachable(reachable))
        };

        if quality != previous {
            self.buffer.lock().await.update_network_quality(quality);
            self.alerts
                .lock()
                .await
                .evaluate_network_change(previous, quality);
        }
    }

    /// Feed a memory sample; runs cleanup on pressure transitions
    ///
    /// Returns the cleanup batch when a pass ran.
    pub async fn update_memory_state(&self, state: MemoryState) -> Option<Vec<CleanupResult>> {
        self.buffer.lock().await.update_memory_state(&state);
        self.alerts
            .lock()
            .await
            .evaluate_memory_pressure(state.pressure);
        self.cleanup.lock().await.handle_pressure(state.pressure).await
    }

    /// Current network quality
    pub async fn network_quality(&self) -> NetworkQuality {
        self.network.lock().await.current_quality()
    }

    /// Current buffer configuration
    pub async fn buffer_configuration(&self) -> BufferConfiguration {
        self.buffer.lock().await.current_configuration()
    }

    /// Starting bitrate for the current network quality
    pub async fn initial_bitrate(&self) -> Option<BitrateLevel> {
        let quality = self.network_quality().await;
        self.strategy.initial_level(quality, &self.levels)
    }

    /// Evaluate a bitrate move for the polling caller
    ///
    /// `buffer_health` is the fraction of the target forward buffer
    /// currently filled; `playback_duration` is total elapsed playback.
    pub async fn evaluate_bitrate(
        &self,
        current: &BitrateLevel,
        buffer_health: f64,
        playback_duration: ChronoDuration,
    ) -> Option<BitrateAdjustment> {
        let quality = self.network_quality().await;
        let ratio = self
            .rebuffering
            .lock()
            .await
            .rebuffer_ratio(playback_duration);

        self.strategy
            .recommend(current, buffer_health, ratio, quality, &self.levels)
    }

    /// Band the current rebuffering picture into an alert, if warranted
    pub async fn evaluate_rebuffering_health(
        &self,
        playback_duration: ChronoDuration,
    ) -> Option<PerformanceAlert> {
        let (ratio, recent) = {
            let rebuffering = self.rebuffering.lock().await;
            (
                rebuffering.rebuffer_ratio(playback_duration),
                rebuffering.events_in_last_minute(),
            )
        };
        self.alerts.lock().await.evaluate_rebuffering(ratio, recent)
    }

    /// Latest startup measurement snapshot
    pub fn startup_measurement(&self) -> Option<crate::startup::StartupMeasurement> {
        self.startup.measurement()
    }

    /// Reset the monitors for a fresh session on the same content
    pub async fn reset_monitors(&self) {
        self.rebuffering.lock().await.reset();
        self.startup.reset();
        self.network.lock().await.reset();
        self.cleanup.lock().await.reset();
        self.alerts.lock().await.reset();
    }

    async fn apply_side_effects(&self, transition: &PlaybackTransition) {
        let entered_buffering = matches!(transition.to, PlaybackState::Buffering(_))
            && !matches!(transition.from, PlaybackState::Buffering(_));
        let left_buffering = matches!(transition.from, PlaybackState::Buffering(_))
            && !matches!(transition.to, PlaybackState::Buffering(_));

        if entered_buffering {
            self.rebuffering.lock().await.buffering_started();
        }
        if left_buffering {
            self.rebuffering.lock().await.buffering_ended();
        }

        // A fresh load starts a fresh measurement window
        if matches!(transition.action, PlaybackAction::Load(_)) {
            self.rebuffering.lock().await.reset();
            self.startup.reset();
            self.startup.record_load_start(transition.timestamp);
        }
    }

    async fn note_first_frame(&self) {
        let was_complete = self
            .startup
            .measurement()
            .map(|m| m.is_complete())
            .unwrap_or(false);

        self.startup.record_first_frame((self.clock)());

        if was_complete {
            return;
        }
        if let Some(ttff) = self
            .startup
            .measurement()
            .and_then(|m| m.time_to_first_frame())
        {
            let secs = ttff.num_milliseconds() as f64 / 1000.0;
            self.alerts.lock().await.evaluate_startup(secs);
        }
    }
}
