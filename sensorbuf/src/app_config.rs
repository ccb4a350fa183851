//! Application configuration for the simulator binary.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! log_level = "info"
//! service_name = "sensorbuf"
//!
//! [buffer]
//! per_source_capacity = 3000
//! window_seconds = 30.0
//!
//! [simulation]
//! sources = 4
//! rate_hz = 100.0
//! stats_interval_ms = 1000
//! ```

use sensorbuf_common::config::{BufferConfig, ConfigError, LogLevel, SharedConfig};
use serde::{Deserialize, Serialize};

fn default_sources() -> usize {
    4
}

fn default_rate_hz() -> f64 {
    100.0
}

fn default_stats_interval_ms() -> u64 {
    1000
}

/// Synthetic producer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of simulated devices.
    #[serde(default = "default_sources")]
    pub sources: usize,

    /// Samples per second per device.
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,

    /// Stop after this many seconds. Runs until Ctrl+C when unset.
    #[serde(default)]
    pub duration_secs: Option<u64>,

    /// Period of the statistics log line.
    #[serde(default = "default_stats_interval_ms")]
    pub stats_interval_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            rate_hz: default_rate_hz(),
            duration_secs: None,
            stats_interval_ms: default_stats_interval_ms(),
        }
    }
}

impl SimulationConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for zero sources, a rate that is
    /// not a positive finite number or a zero stats interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.sources must be greater than 0".to_string(),
            ));
        }
        if !self.rate_hz.is_finite() || self.rate_hz <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "simulation.rate_hz must be a positive number, got {}",
                self.rate_hz
            )));
        }
        if self.stats_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.stats_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Milliseconds between two samples of one device.
    pub fn sample_period_ms(&self) -> f64 {
        1000.0 / self.rate_hz
    }
}

/// Top-level configuration file of the `sensorbuf` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging and instance identity.
    pub shared: SharedConfig,

    /// Coordinator settings.
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Producer settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig {
                log_level: LogLevel::default(),
                service_name: "sensorbuf".to_string(),
            },
            buffer: BufferConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.buffer.validate()?;
        self.simulation.validate()
    }
}
