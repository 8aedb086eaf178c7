//! Bitrate selection strategies
//!
//! Strategies are pure: callers poll them with current conditions and
//! apply at most one decision. Upgrade and downgrade checks are
//! independent; `recommend` encodes the precedence explicitly so callers
//! do not have to infer it from call order.

use crate::error::{Error, Result};
use crate::types::{BitrateLevel, NetworkQuality};
use tracing::debug;

/// Tunables for the conservative strategy, validated at construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitrateThresholds {
    /// Minimum buffer health (fraction of target buffer filled) before
    /// an upgrade is considered
    pub upgrade_buffer_health: f64,
    /// Rebuffer ratio at or above which a downgrade fires
    pub downgrade_rebuffer_ratio: f64,
}

impl Default for BitrateThresholds {
    fn default() -> Self {
        Self {
            upgrade_buffer_health: 0.7,
            downgrade_rebuffer_ratio: 0.05,
        }
    }
}

impl BitrateThresholds {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.upgrade_buffer_health) {
            return Err(Error::config(format!(
                "upgrade_buffer_health must be in [0, 1], got {}",
                self.upgrade_buffer_health
            )));
        }
        if !(0.0..=1.0).contains(&self.downgrade_rebuffer_ratio) {
            return Err(Error::config(format!(
                "downgrade_rebuffer_ratio must be in [0, 1], got {}",
                self.downgrade_rebuffer_ratio
            )));
        }
        Ok(())
    }
}

/// A single quality move recommended to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum BitrateAdjustment {
    Upgrade(BitrateLevel),
    Downgrade(BitrateLevel),
}

impl BitrateAdjustment {
    /// The level the player should switch to
    pub fn level(&self) -> &BitrateLevel {
        match self {
            BitrateAdjustment::Upgrade(level) | BitrateAdjustment::Downgrade(level) => level,
        }
    }
}

/// Bitrate strategy trait
pub trait BitrateStrategy: Send + Sync {
    /// Pick the starting level for a fresh session
    fn initial_level(
        &self,
        quality: NetworkQuality,
        levels: &[BitrateLevel],
    ) -> Option<BitrateLevel>;

    /// Next-higher level, when conditions justify an upgrade
    fn upgrade_level(
        &self,
        current: &BitrateLevel,
        buffer_health: f64,
        quality: NetworkQuality,
        levels: &[BitrateLevel],
    ) -> Option<BitrateLevel>;

    /// Next-lower level, when conditions demand a downgrade
    fn downgrade_level(
        &self,
        current: &BitrateLevel,
        rebuffer_ratio: f64,
        quality: NetworkQuality,
        levels: &[BitrateLevel],
    ) -> Option<BitrateLevel>;

    /// Strategy name
    fn name(&self) -> &'static str;

    /// Evaluate both directions and return at most one move
    ///
    /// Downgrade takes precedence when both would fire, since it
    /// protects against stalls.
    fn recommend(
        &self,
        current: &BitrateLevel,
        buffer_health: f64,
        rebuffer_ratio: f64,
        quality: NetworkQuality,
        levels: &[BitrateLevel],
    ) -> Option<BitrateAdjustment> {
        if let Some(level) = self.downgrade_level(current, rebuffer_ratio, quality, levels) {
            return Some(BitrateAdjustment::Downgrade(level));
        }
        self.upgrade_level(current, buffer_health, quality, levels)
            .map(BitrateAdjustment::Upgrade)
    }
}

/// Conservative strategy: start mid-ladder, climb slowly, drop fast
pub struct ConservativeBitrateStrategy {
    thresholds: BitrateThresholds,
}

impl ConservativeBitrateStrategy {
    /// Create with default thresholds (0.7 buffer health, 0.05 rebuffer
    /// ratio)
    pub fn new() -> Self {
        Self {
            thresholds: BitrateThresholds::default(),
        }
    }

    /// Create with custom thresholds, rejecting out-of-range values
    pub fn with_thresholds(thresholds: BitrateThresholds) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    fn sorted_ascending(levels: &[BitrateLevel]) -> Vec<BitrateLevel> {
        let mut sorted = levels.to_vec();
        sorted.sort();
        sorted
    }
}

impl Default for ConservativeBitrateStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl BitrateStrategy for ConservativeBitrateStrategy {
    fn initial_level(
        &self,
        quality: NetworkQuality,
        levels: &[BitrateLevel],
    ) -> Option<BitrateLevel> {
        let sorted = Self::sorted_ascending(levels);
        if sorted.is_empty() {
            return None;
        }

        let index = match quality {
            NetworkQuality::Offline | NetworkQuality::Poor => 0,
            NetworkQuality::Fair => sorted.len() / 3,
            NetworkQuality::Good => sorted.len() * 2 / 3,
            NetworkQuality::Excellent => sorted.len() - 1,
        };

        let level = sorted.into_iter().nth(index);
        debug!(%quality, level = ?level, "initial bitrate selected");
        level
    }

    fn upgrade_level(
        &self,
        current: &BitrateLevel,
        buffer_health: f64,
        quality: NetworkQuality,
        levels: &[BitrateLevel],
    ) -> Option<BitrateLevel> {
        if quality < NetworkQuality::Good {
            return None;
        }
        if buffer_health < self.thresholds.upgrade_buffer_health {
            return None;
        }

        Self::sorted_ascending(levels)
            .into_iter()
            .find(|level| level.bitrate > current.bitrate)
    }

    fn downgrade_level(
        &self,
        current: &BitrateLevel,
        rebuffer_ratio: f64,
        quality: NetworkQuality,
        levels: &[BitrateLevel],
    ) -> Option<BitrateLevel> {
        let stalling = rebuffer_ratio >= self.thresholds.downgrade_rebuffer_ratio;
        let weak_network = quality <= NetworkQuality::Poor;
        if !stalling && !weak_network {
            return None;
        }

        Self::sorted_ascending(levels)
            .into_iter()
            .rev()
            .find(|level| level.bitrate < current.bitrate)
    }

    fn name(&self) -> &'static str {
        "conservative"
    }
}
