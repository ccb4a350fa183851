//! Error types for buffer construction and configuration

use sensorbuf_common::config::ConfigError;
use thiserror::Error;

/// Errors that can occur while building or reconfiguring buffers.
///
/// Runtime operations (append, queries, eviction) never fail; only a
/// misconfigured deployment or a failed scheduler spawn is reported.
#[derive(Error, Debug)]
pub enum BufferError {
    /// Coordinator configuration rejected
    #[error("Invalid buffer configuration: {source}")]
    InvalidConfig {
        /// Validation failure
        #[from]
        source: ConfigError,
    },

    /// Ring buffer capacity must be at least one slot
    #[error("Invalid ring buffer capacity: {capacity} (must be >= 1)")]
    InvalidCapacity {
        /// Requested capacity
        capacity: usize,
    },

    /// Sliding window must be finite and positive
    #[error("Invalid window: {window_seconds}s (must be finite and > 0)")]
    InvalidWindow {
        /// Requested window in seconds
        window_seconds: f64,
    },

    /// Periodic tick thread could not be spawned
    #[error("Failed to start cleanup scheduler: {source}")]
    Scheduler {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;
