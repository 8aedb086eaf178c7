//! Error types for Bioscope Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
///
/// These are construction-time failures. Rejected playback actions are
/// not errors (`PlaybackStateMachine::send` returns `None` for those),
/// and playback failures travel inside the state machine as
/// [`PlaybackError`] values.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }
}

/// Playback failure carried by `PlaybackState::Failed` and
/// `PlaybackAction::Failed`
///
/// Recovery is always explicit: only a recoverable error allows the
/// `Retry` action, and nothing retries automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum PlaybackError {
    #[error("failed to load content: {0}")]
    LoadFailed(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("media decoding error: {0}")]
    Decoding(String),

    #[error("DRM error: {0}")]
    Drm(String),

    #[error("unknown playback error: {0}")]
    Unknown(String),
}

impl PlaybackError {
    /// Returns true if this error can be recovered via the `Retry` action
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlaybackError::Network(_))
    }

    /// Returns the error code for analytics
    pub fn error_code(&self) -> &'static str {
        match self {
            PlaybackError::LoadFailed(_) => "LOAD_FAILED",
            PlaybackError::Network(_) => "NETWORK",
            PlaybackError::Decoding(_) => "DECODING",
            PlaybackError::Drm(_) => "DRM",
            PlaybackError::Unknown(_) => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_are_recoverable() {
        assert!(PlaybackError::Network("timeout".into()).is_recoverable());
        assert!(!PlaybackError::LoadFailed("404".into()).is_recoverable());
        assert!(!PlaybackError::Decoding("bad frame".into()).is_recoverable());
        assert!(!PlaybackError::Drm("license".into()).is_recoverable());
        assert!(!PlaybackError::Unknown("?".into()).is_recoverable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(PlaybackError::Network("x".into()).error_code(), "NETWORK");
        assert_eq!(PlaybackError::Drm("x".into()).error_code(), "DRM");
    }

    #[test]
    fn test_playback_error_serialization() {
        let error = PlaybackError::Network("connection reset".into());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("network"));
        assert!(json.contains("connection reset"));

        let back: PlaybackError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, error);
    }
}
