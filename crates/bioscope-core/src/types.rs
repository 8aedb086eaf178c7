//! Core types for Bioscope

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use url::Url;
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rung on the bitrate ladder
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitrateLevel {
    /// Bitrate in bits per second
    pub bitrate: u64,
    /// Human-readable label (e.g. "720p")
    pub label: String,
}

impl BitrateLevel {
    pub fn new(bitrate: u64, label: impl Into<String>) -> Self {
        Self {
            bitrate,
            label: label.into(),
        }
    }
}

// Levels order by bitrate; label only breaks ties so Ord stays
// consistent with Eq.
impl Ord for BitrateLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bitrate
            .cmp(&other.bitrate)
            .then_with(|| self.label.cmp(&other.label))
    }
}

impl PartialOrd for BitrateLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for BitrateLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.1} Mbps)", self.label, self.bitrate as f64 / 1_000_000.0)
    }
}

/// Standard five-rung ladder used when the manifest does not provide one
pub fn standard_ladder() -> Vec<BitrateLevel> {
    vec![
        BitrateLevel::new(500_000, "360p"),
        BitrateLevel::new(1_000_000, "480p"),
        BitrateLevel::new(2_500_000, "720p"),
        BitrateLevel::new(5_000_000, "1080p"),
        BitrateLevel::new(15_000_000, "4K"),
    ]
}

/// Connection quality classification, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkQuality {
    Offline,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl std::fmt::Display for NetworkQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkQuality::Offline => write!(f, "offline"),
            NetworkQuality::Poor => write!(f, "poor"),
            NetworkQuality::Fair => write!(f, "fair"),
            NetworkQuality::Good => write!(f, "good"),
            NetworkQuality::Excellent => write!(f, "excellent"),
        }
    }
}

/// System memory scarcity classification, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPressure {
    Normal,
    Warning,
    Critical,
}

impl std::fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryPressure::Normal => write!(f, "normal"),
            MemoryPressure::Warning => write!(f, "warning"),
            MemoryPressure::Critical => write!(f, "critical"),
        }
    }
}

/// Snapshot of system memory at sample time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryState {
    /// Bytes still available to the process
    pub available_bytes: u64,
    /// Bytes currently in use
    pub used_bytes: u64,
    /// Pressure classification derived from the usage ratio
    pub pressure: MemoryPressure,
}

impl MemoryState {
    /// Fraction of total memory in use, in `[0, 1]`
    pub fn usage_ratio(&self) -> f64 {
        let total = self.used_bytes + self.available_bytes;
        if total == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / total as f64
    }
}

/// Buffer sizing posture chosen from pressure signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferStrategy {
    Minimal,
    Conservative,
    Balanced,
    Aggressive,
}

impl BufferStrategy {
    /// The concrete configuration this posture maps to
    pub fn configuration(&self) -> BufferConfiguration {
        match self {
            BufferStrategy::Minimal => BufferConfiguration::minimal(),
            BufferStrategy::Conservative => BufferConfiguration::conservative(),
            BufferStrategy::Balanced => BufferConfiguration::balanced(),
            BufferStrategy::Aggressive => BufferConfiguration::aggressive(),
        }
    }
}

impl std::fmt::Display for BufferStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferStrategy::Minimal => write!(f, "minimal"),
            BufferStrategy::Conservative => write!(f, "conservative"),
            BufferStrategy::Balanced => write!(f, "balanced"),
            BufferStrategy::Aggressive => write!(f, "aggressive"),
        }
    }
}

/// Buffer configuration applied to the platform player
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferConfiguration {
    /// Seconds of media to keep buffered ahead of the playhead
    pub preferred_forward_duration: f64,
    /// Seconds of forward buffer below which playback should not start
    pub minimum_forward_duration: f64,
    /// Hard cap on buffered media memory
    pub max_buffer_bytes: usize,
}

impl BufferConfiguration {
    /// Smallest usable buffer, for critical memory pressure
    pub fn minimal() -> Self {
        Self {
            preferred_forward_duration: 5.0,
            minimum_forward_duration: 2.0,
            max_buffer_bytes: 16 * 1024 * 1024,
        }
    }

    /// Reduced buffer for constrained memory or weak networks
    pub fn conservative() -> Self {
        Self {
            preferred_forward_duration: 15.0,
            minimum_forward_duration: 5.0,
            max_buffer_bytes: 64 * 1024 * 1024,
        }
    }

    /// Default posture
    pub fn balanced() -> Self {
        Self {
            preferred_forward_duration: 30.0,
            minimum_forward_duration: 10.0,
            max_buffer_bytes: 128 * 1024 * 1024,
        }
    }

    /// Deep buffer when memory and network both allow it
    pub fn aggressive() -> Self {
        Self {
            preferred_forward_duration: 60.0,
            minimum_forward_duration: 15.0,
            max_buffer_bytes: 256 * 1024 * 1024,
        }
    }
}

impl Default for BufferConfiguration {
    fn default() -> Self {
        Self::balanced()
    }
}

/// Cleanup urgency, ordered least to most disruptive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPriority {
    Low,
    Medium,
    High,
}

/// Outcome of a single cleaner invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResult {
    /// Cleaner name
    pub name: String,
    /// Bytes released by this cleaner
    pub bytes_freed: u64,
    /// Whether the cleaner completed
    pub success: bool,
    /// Failure description when `success` is false
    pub error: Option<String>,
}

impl CleanupResult {
    pub fn succeeded(name: impl Into<String>, bytes_freed: u64) -> Self {
        Self {
            name: name.into(),
            bytes_freed,
            success: true,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytes_freed: 0,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// A playlist entry eligible for anticipatory fetching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreloadableVideo {
    /// Stable identifier within the playlist
    pub id: String,
    /// Content URL
    pub url: Url,
    /// Estimated duration in seconds, when known
    pub estimated_duration: Option<f64>,
}

impl PreloadableVideo {
    pub fn new(id: impl Into<String>, url: Url) -> Self {
        Self {
            id: id.into(),
            url,
            estimated_duration: None,
        }
    }

    pub fn with_estimated_duration(mut self, seconds: f64) -> Self {
        self.estimated_duration = Some(seconds);
        self
    }
}

/// Urgency of an anticipatory fetch, ordered least to most urgent
///
/// `Immediate` is the only priority the caller awaits; everything else
/// is fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreloadPriority {
    Low,
    Medium,
    High,
    Immediate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitrate_level_ordering() {
        let mut levels = standard_ladder();
        levels.reverse();
        levels.sort();

        let bitrates: Vec<u64> = levels.iter().map(|l| l.bitrate).collect();
        assert_eq!(
            bitrates,
            vec![500_000, 1_000_000, 2_500_000, 5_000_000, 15_000_000]
        );
    }

    #[test]
    fn test_network_quality_ordering() {
        assert!(NetworkQuality::Offline < NetworkQuality::Poor);
        assert!(NetworkQuality::Poor < NetworkQuality::Fair);
        assert!(NetworkQuality::Fair < NetworkQuality::Good);
        assert!(NetworkQuality::Good < NetworkQuality::Excellent);
    }

    #[test]
    fn test_memory_state_usage_ratio() {
        let state = MemoryState {
            available_bytes: 300,
            used_bytes: 700,
            pressure: MemoryPressure::Warning,
        };
        assert!((state.usage_ratio() - 0.7).abs() < f64::EPSILON);

        let empty = MemoryState {
            available_bytes: 0,
            used_bytes: 0,
            pressure: MemoryPressure::Normal,
        };
        assert_eq!(empty.usage_ratio(), 0.0);
    }

    #[test]
    fn test_buffer_presets_scale_up() {
        let minimal = BufferConfiguration::minimal();
        let conservative = BufferConfiguration::conservative();
        let balanced = BufferConfiguration::balanced();
        let aggressive = BufferConfiguration::aggressive();

        assert!(minimal.preferred_forward_duration < conservative.preferred_forward_duration);
        assert!(conservative.preferred_forward_duration < balanced.preferred_forward_duration);
        assert!(balanced.preferred_forward_duration < aggressive.preferred_forward_duration);
        assert!(minimal.max_buffer_bytes < aggressive.max_buffer_bytes);
    }

    #[test]
    fn test_cleanup_priority_ordering() {
        assert!(CleanupPriority::Low < CleanupPriority::Medium);
        assert!(CleanupPriority::Medium < CleanupPriority::High);
    }

    #[test]
    fn test_preload_priority_ordering() {
        assert!(PreloadPriority::High < PreloadPriority::Immediate);
        assert!(PreloadPriority::Low < PreloadPriority::High);
    }
}
