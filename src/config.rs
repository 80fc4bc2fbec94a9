//! Runtime configuration consumed by the parsers and the message synthesizer.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields the stock configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default outbound message period (10 Hz)
pub const DEFAULT_MESSAGE_INTERVAL_MS: u64 = 100;

/// Shortest accepted outbound message period
pub const MIN_MESSAGE_INTERVAL_MS: u64 = 10;

/// Longest accepted outbound message period
pub const MAX_MESSAGE_INTERVAL_MS: u64 = 1000;

/// Flags and intervals read from outside the navigation core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Clamp VTG speeds below 0.1 kn to zero
    pub noise_filter: bool,
    /// Emit per-sentence and per-packet debug events
    pub debug: bool,
    /// Swap pitch and roll on the RVC IMU (alternate mounting)
    pub imu_swap_xy: bool,
    /// Negate EasyProfile roll (inverted mounting)
    pub imu_negate_roll: bool,
    /// Outbound sentence period, clamped to 10..=1000 ms when applied
    pub message_interval_ms: u64,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            noise_filter: true,
            debug: false,
            imu_swap_xy: false,
            imu_negate_roll: true,
            message_interval_ms: DEFAULT_MESSAGE_INTERVAL_MS,
        }
    }
}

impl NavConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Message interval with the range clamp applied.
    pub fn message_interval(&self) -> u64 {
        clamp_interval(self.message_interval_ms)
    }
}

/// Clamp an outbound period into the accepted 10..=1000 ms range.
pub fn clamp_interval(ms: u64) -> u64 {
    ms.clamp(MIN_MESSAGE_INTERVAL_MS, MAX_MESSAGE_INTERVAL_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NavConfig::default();
        assert!(config.noise_filter);
        assert!(!config.debug);
        assert!(!config.imu_swap_xy);
        assert!(config.imu_negate_roll);
        assert_eq!(config.message_interval(), 100);
    }

    #[test]
    fn test_empty_json_is_default() {
        let config = NavConfig::from_json_str("{}").unwrap();
        assert_eq!(config, NavConfig::default());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config =
            NavConfig::from_json_str(r#"{"imu_negate_roll": false, "message_interval_ms": 50}"#)
                .unwrap();
        assert!(!config.imu_negate_roll);
        assert!(config.noise_filter);
        assert_eq!(config.message_interval(), 50);
    }

    #[test]
    fn test_interval_is_clamped() {
        assert_eq!(clamp_interval(0), 10);
        assert_eq!(clamp_interval(5_000), 1000);
        assert_eq!(clamp_interval(250), 250);
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = NavConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = NavConfig::load("/nonexistent/autosteer-nav.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
