//! Timestamped multi-channel sample.
//!
//! A [`Sample`] is an immutable value: one observation from one source.
//! The channel set is fixed at compile time (see [`crate::consts`]) so the
//! per-sample memory estimate stays meaningful.

use crate::consts::{ACCELERATION_CHANNELS, CHANNEL_COUNT, RESISTANCE_CHANNELS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque source key. Shared between all samples of a source.
pub type SourceId = Arc<str>;

/// One timestamped observation from a streaming source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Producing source.
    pub source_id: SourceId,

    /// Milliseconds since an arbitrary, per-deployment epoch.
    pub timestamp: i64,

    /// Channel values: resistance channels first, then acceleration.
    pub channels: [f64; CHANNEL_COUNT],
}

impl Sample {
    /// Create a sample from raw channel values.
    pub fn new(source_id: impl Into<SourceId>, timestamp: i64, channels: [f64; CHANNEL_COUNT]) -> Self {
        Self {
            source_id: source_id.into(),
            timestamp,
            channels,
        }
    }

    /// Create a sample from the two channel groups.
    pub fn from_groups(
        source_id: impl Into<SourceId>,
        timestamp: i64,
        resistance: [f64; RESISTANCE_CHANNELS],
        acceleration: [f64; ACCELERATION_CHANNELS],
    ) -> Self {
        let mut channels = [0.0; CHANNEL_COUNT];
        channels[..RESISTANCE_CHANNELS].copy_from_slice(&resistance);
        channels[RESISTANCE_CHANNELS..].copy_from_slice(&acceleration);
        Self::new(source_id, timestamp, channels)
    }

    /// Resistance channel values.
    pub fn resistance(&self) -> &[f64] {
        &self.channels[..RESISTANCE_CHANNELS]
    }

    /// Acceleration channel values.
    pub fn acceleration(&self) -> &[f64] {
        &self.channels[RESISTANCE_CHANNELS..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_groups() {
        let sample = Sample::from_groups("dev-1", 10, [1.0, 2.0, 3.0], [4.0, 5.0, 6.0]);
        assert_eq!(sample.resistance(), &[1.0, 2.0, 3.0]);
        assert_eq!(sample.acceleration(), &[4.0, 5.0, 6.0]);
        assert_eq!(sample.channels, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(&*sample.source_id, "dev-1");
    }

    #[test]
    fn test_source_id_is_shared() {
        let id: SourceId = Arc::from("dev-2");
        let a = Sample::new(Arc::clone(&id), 1, [0.0; CHANNEL_COUNT]);
        let b = Sample::new(Arc::clone(&id), 2, [0.0; CHANNEL_COUNT]);
        assert!(Arc::ptr_eq(&a.source_id, &b.source_id));
    }

    #[test]
    fn test_json_shape() {
        let sample = Sample::new("dev-3", 42, [0.5; CHANNEL_COUNT]);
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["source_id"], "dev-3");
        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["channels"].as_array().unwrap().len(), CHANNEL_COUNT);

        let back: Sample = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample);
    }
}
