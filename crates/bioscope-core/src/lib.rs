//! Bioscope Core - Adaptive Playback Control
//!
//! This crate is the decision layer of a mobile video streaming client:
//! - Playback lifecycle state machine with an explicit transition table
//! - Conservative bitrate strategy over a quality ladder
//! - Adaptive buffer sizing from memory and network pressure
//! - Rebuffering, memory, network, and startup-latency monitors
//! - Prioritized resource cleanup coordination
//! - Anticipatory video preloading
//! - Performance alert generation
//!
//! It renders nothing and fetches nothing: platform adapters translate
//! raw player/network/memory events into the types here, and effectors
//! apply the emitted decisions to the concrete player.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Bioscope Core                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  player events ──► ┌───────────────┐ ──► state / transitions │
//! │                    │ State Machine │                         │
//! │                    └───────┬───────┘                         │
//! │                            │                                 │
//! │  net samples ──► ┌─────────┴─────────┐ ◄── memory samples    │
//! │                  │     Monitors      │                       │
//! │                  │ network rebuffer  │                       │
//! │                  │ memory  startup   │                       │
//! │                  └─────────┬─────────┘                       │
//! │                            │                                 │
//! │                  ┌─────────┴─────────┐                       │
//! │                  │    Strategies     │ ──► bitrate moves,    │
//! │                  │ bitrate  buffer   │     buffer configs,   │
//! │                  │ preload  cleanup  │     cleanup batches,  │
//! │                  │ alerts            │     preload sets,     │
//! │                  └───────────────────┘     alerts            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod alerts;
pub mod bitrate;
pub mod buffer;
pub mod cleanup;
pub mod clock;
pub mod error;
pub mod memory;
pub mod network;
pub mod preload;
pub mod rebuffering;
pub mod session;
pub mod startup;
pub mod state_machine;
pub mod types;

pub use alerts::{AlertGenerator, AlertKind, AlertSeverity, PerformanceAlert, PerformanceThresholds};
pub use bitrate::{
    BitrateAdjustment, BitrateStrategy, BitrateThresholds, ConservativeBitrateStrategy,
};
pub use buffer::AdaptiveBufferManager;
pub use cleanup::{ResourceCleaner, ResourceCleanupCoordinator};
pub use clock::{system_time_source, ManualClock, TimeSource};
pub use error::{Error, PlaybackError, Result};
pub use memory::{MemoryMonitor, MemoryMonitorConfig, MemoryReader, MemorySample, MemoryThresholds};
pub use network::{BandwidthEstimator, BandwidthSample, NetworkQualityMonitor};
pub use preload::{AdjacentVideoPreloadStrategy, PreloadFetcher, PreloadStrategy, VideoPreloader};
pub use rebuffering::{RebufferingEvent, RebufferingMonitor};
pub use session::{SessionConfig, StreamingSession};
pub use startup::{StartupMeasurement, StartupTimeTracker};
pub use state_machine::{
    PlaybackAction, PlaybackState, PlaybackStateMachine, PlaybackTransition, ResumeTarget,
};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Bioscope Core initialized");
}
