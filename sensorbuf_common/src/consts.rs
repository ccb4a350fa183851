//! System-wide constants for the SensorBuf workspace.
//!
//! Single source of truth for channel layout and buffer sizing heuristics.

use static_assertions::const_assert_eq;

/// Number of resistance channels per sample.
pub const RESISTANCE_CHANNELS: usize = 3;

/// Number of acceleration channels per sample.
pub const ACCELERATION_CHANNELS: usize = 3;

/// Total number of numeric channels carried by a sample.
pub const CHANNEL_COUNT: usize = RESISTANCE_CHANNELS + ACCELERATION_CHANNELS;

const_assert_eq!(CHANNEL_COUNT, 6);

/// Estimated memory footprint of one retained sample in bytes.
///
/// Heuristic, not a measurement: six channels, a timestamp and the shared
/// source key. Only used to trigger eviction.
pub const BYTES_PER_SAMPLE: usize = 64;

/// Fraction of each buffer's capacity kept by emergency compaction.
pub const COMPACTION_RETAIN_RATIO: f64 = 0.5;

/// Minimum real time between two age prunes of the same buffer (ms).
pub const PRUNE_THROTTLE_MS: u64 = 1000;

/// Default retained samples per source.
pub const DEFAULT_PER_SOURCE_CAPACITY: usize = 3000;

/// Default aggregate memory ceiling (50 MiB).
pub const DEFAULT_MEMORY_THRESHOLD_BYTES: usize = 50 * 1024 * 1024;

/// Default periodic cleanup interval (ms).
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 5000;

/// Default sliding window (s).
pub const DEFAULT_WINDOW_SECONDS: f64 = 30.0;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sensorbuf/config.toml";
