//! Configuration loading traits and types.
//!
//! This module provides the buffer configuration shared by the store and the
//! binary, plus a standardized way to load TOML configuration files.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sensorbuf_common::config::{BufferConfig, ConfigLoader, SharedConfig, ConfigError};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct MyAppConfig {
//!     shared: SharedConfig,
//!     buffer: BufferConfig,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = MyAppConfig::load(Path::new("config.toml"))?;
//!     config.buffer.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_CLEANUP_INTERVAL_MS, DEFAULT_MEMORY_THRESHOLD_BYTES,
    DEFAULT_PER_SOURCE_CAPACITY, DEFAULT_WINDOW_SECONDS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Common configuration fields shared across SensorBuf applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "sensorbuf-bench-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_per_source_capacity() -> usize {
    DEFAULT_PER_SOURCE_CAPACITY
}

fn default_memory_threshold_bytes() -> usize {
    DEFAULT_MEMORY_THRESHOLD_BYTES
}

fn default_cleanup_interval_ms() -> u64 {
    DEFAULT_CLEANUP_INTERVAL_MS
}

fn default_window_seconds() -> f64 {
    DEFAULT_WINDOW_SECONDS
}

/// Buffer coordinator configuration.
///
/// Supplied once at construction and replaceable at runtime. Replacing it
/// never resizes buffers that already exist.
///
/// # TOML Example
///
/// ```toml
/// [buffer]
/// per_source_capacity = 3000
/// memory_threshold_bytes = 52428800
/// cleanup_interval_ms = 5000
/// window_seconds = 30.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BufferConfig {
    /// Maximum retained samples per source.
    #[serde(default = "default_per_source_capacity")]
    pub per_source_capacity: usize,

    /// Aggregate memory estimate above which emergency compaction runs.
    #[serde(default = "default_memory_threshold_bytes")]
    pub memory_threshold_bytes: usize,

    /// Period of the maintenance tick in milliseconds.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,

    /// Sliding window served by time-window queries, in seconds.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: f64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            per_source_capacity: DEFAULT_PER_SOURCE_CAPACITY,
            memory_threshold_bytes: DEFAULT_MEMORY_THRESHOLD_BYTES,
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
            window_seconds: DEFAULT_WINDOW_SECONDS,
        }
    }
}

impl BufferConfig {
    /// Validate the configuration.
    ///
    /// # Validation Rules
    /// 1. `per_source_capacity` > 0
    /// 2. `memory_threshold_bytes` > 0
    /// 3. `cleanup_interval_ms` > 0
    /// 4. `window_seconds` finite and > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.per_source_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "per_source_capacity must be greater than 0".to_string(),
            ));
        }
        if self.memory_threshold_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "memory_threshold_bytes must be greater than 0".to_string(),
            ));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "cleanup_interval_ms must be greater than 0".to_string(),
            ));
        }
        if !self.window_seconds.is_finite() || self.window_seconds <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "window_seconds must be a positive number, got {}",
                self.window_seconds
            )));
        }
        Ok(())
    }

    /// Cleanup interval as a [`Duration`].
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    /// Sliding window in milliseconds.
    pub fn window_ms(&self) -> i64 {
        (self.window_seconds * 1000.0) as i64
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
