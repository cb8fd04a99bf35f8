//! Configuration management for the fixture engine
//!
//! Runtime configuration is loaded from JSON files so host runners can
//! change teardown policy, lifecycle telemetry sizing and log verbosity
//! without recompiling.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::FixtureError;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub teardown: TeardownConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How a scope-wide teardown sweep reacts to a failing fixture.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TeardownPolicy {
    /// Keep sweeping, then report every failure together
    #[default]
    CollectAndContinue,
    /// Return after the first fixture whose teardown failed
    StopOnFirstFailure,
}

/// Teardown sweep configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TeardownConfig {
    #[serde(default)]
    pub policy: TeardownPolicy,
}

/// Lifecycle telemetry sizing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    /// Broadcast channel capacity for live subscribers
    pub channel_capacity: usize,
    /// Number of lifecycle events retained for snapshots
    pub history_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            history_capacity: 1024,
        }
    }
}

/// Log verbosity used by `init_tracing`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse configuration from JSON, rejecting malformed input.
    pub fn from_json(data: &str) -> Result<Self, FixtureError> {
        let config: EngineConfig =
            serde_json::from_str(data).map_err(|err| FixtureError::InvalidConfig {
                reason: format!("failed to parse engine config JSON: {err}"),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or defaults when the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<(), FixtureError> {
        if self.telemetry.channel_capacity == 0 {
            return Err(FixtureError::InvalidConfig {
                reason: "telemetry.channel_capacity must be > 0".to_string(),
            });
        }
        Ok(())
    }
}
