//! Error types for the fallible edges of the crate.
//!
//! Stream parsing itself never fails: malformed input is reported through
//! outcome enums and statistics counters. These errors cover configuration
//! loading and the serial/network plumbing around the parsers.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a [`NavConfig`](crate::config::NavConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the device and transport glue.
#[derive(Error, Debug)]
pub enum NavError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// An IMU family name that does not match any supported parser.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown IMU kind '{0}', expected 'rvc' or 'easy-profile'")]
pub struct UnknownImuKind(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_mentions_path() {
        let err = ConfigError::Io {
            path: PathBuf::from("/tmp/missing.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("/tmp/missing.json"));
    }

    #[test]
    fn test_nav_error_from_io() {
        let err: NavError = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow").into();
        assert!(matches!(err, NavError::Io(_)));
        assert!(err.to_string().starts_with("I/O error"));
    }
}
