//! Configuration loading and typed config structures for `SignalGrid`.
//!
//! The canonical configuration lives in `signalgrid-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.
//! Every field has a default, so an empty file yields a working controller
//! with the reference dwell table and no seed lights.

use std::path::Path;

use serde::{Deserialize, Serialize};
use signalgrid_types::{Color, TrafficLightInit};

/// Smallest tick interval accepted from configuration, in milliseconds.
pub const MIN_TICK_INTERVAL_MS: u64 = 100;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but violates a constraint.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `signalgrid-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SignalGridConfig {
    /// Controller timing and queue sizes.
    #[serde(default)]
    pub controller: ControllerConfig,

    /// Infrastructure connection settings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Optional limits on how long the controller loop runs.
    #[serde(default)]
    pub run: RunBoundsConfig,

    /// Lights registered at startup when the store has none.
    #[serde(default)]
    pub lights: Vec<TrafficLightInit>,
}

impl SignalGridConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for infrastructure:
    /// - `DRAGONFLY_URL` overrides `infrastructure.dragonfly_url`
    /// - `OBSERVER_PORT` overrides `infrastructure.observer_port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value violates a constraint.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value violates a constraint.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yml maps an empty document to unit, not to an empty map.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.infrastructure.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller.validate()
    }
}

/// Controller timing and internal queue sizes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ControllerConfig {
    /// Real-time milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Dwell duration per color.
    #[serde(default)]
    pub dwell: DwellConfig,

    /// Capacity of the live event broadcast channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Capacity of the persistence sync queue.
    #[serde(default = "default_sync_queue_capacity")]
    pub sync_queue_capacity: usize,

    /// Number of recent events kept per light for the event log.
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
}

impl ControllerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms < MIN_TICK_INTERVAL_MS {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "controller.tick_interval_ms must be at least {MIN_TICK_INTERVAL_MS}"
                ),
            });
        }
        if self.event_channel_capacity == 0 || self.sync_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "channel capacities must be at least 1".to_owned(),
            });
        }
        self.dwell.validate()
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            dwell: DwellConfig::default(),
            event_channel_capacity: default_event_channel_capacity(),
            sync_queue_capacity: default_sync_queue_capacity(),
            event_log_capacity: default_event_log_capacity(),
        }
    }
}

/// Seconds a light stays on each color before auto-advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DwellConfig {
    /// Dwell after entering red.
    #[serde(default = "default_red_dwell")]
    pub red: u32,

    /// Dwell after entering green.
    #[serde(default = "default_green_dwell")]
    pub green: u32,

    /// Dwell after entering yellow.
    #[serde(default = "default_yellow_dwell")]
    pub yellow: u32,
}

impl DwellConfig {
    /// Dwell duration for a color.
    pub const fn seconds(&self, color: Color) -> u32 {
        match color {
            Color::Red => self.red,
            Color::Green => self.green,
            Color::Yellow => self.yellow,
        }
    }

    /// Check that every duration is at least one second.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first zero duration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for color in Color::ALL {
            if self.seconds(color) == 0 {
                return Err(ConfigError::Invalid {
                    reason: format!("controller.dwell.{color} must be at least 1 second"),
                });
            }
        }
        Ok(())
    }
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            red: default_red_dwell(),
            green: default_green_dwell(),
            yellow: default_yellow_dwell(),
        }
    }
}

/// Infrastructure connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// Dragonfly (Redis-compatible) URL.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,

    /// Whether light state is mirrored to Dragonfly.
    #[serde(default)]
    pub persistence_enabled: bool,

    /// Observer API bind address.
    #[serde(default = "default_observer_host")]
    pub observer_host: String,

    /// Observer API port.
    #[serde(default = "default_observer_port")]
    pub observer_port: u16,
}

impl InfrastructureConfig {
    /// Override infrastructure settings with environment variables when set.
    ///
    /// A non-numeric `OBSERVER_PORT` is ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DRAGONFLY_URL") {
            self.dragonfly_url = val;
        }
        if let Ok(port) = std::env::var("OBSERVER_PORT").map(|v| v.parse::<u16>()) {
            match port {
                Ok(port) => self.observer_port = port,
                Err(e) => tracing::warn!(error = %e, "ignoring invalid OBSERVER_PORT"),
            }
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            dragonfly_url: default_dragonfly_url(),
            persistence_enabled: false,
            observer_host: default_observer_host(),
            observer_port: default_observer_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Limits on the controller loop. A value of 0 means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunBoundsConfig {
    /// Maximum number of ticks before the loop ends (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,

    /// Maximum wall-clock seconds before the loop ends (0 = unlimited).
    #[serde(default)]
    pub max_real_time_seconds: u64,
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_tick_interval_ms() -> u64 {
    1_000
}

const fn default_event_channel_capacity() -> usize {
    1_024
}

const fn default_sync_queue_capacity() -> usize {
    1_024
}

const fn default_event_log_capacity() -> usize {
    100
}

const fn default_red_dwell() -> u32 {
    30
}

const fn default_green_dwell() -> u32 {
    25
}

const fn default_yellow_dwell() -> u32 {
    5
}

fn default_dragonfly_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_observer_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}
