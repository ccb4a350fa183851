//! Property tests for ring buffer ordering and coordinator memory bounds

use proptest::prelude::*;
use sensorbuf_common::config::BufferConfig;
use sensorbuf_common::consts::{BYTES_PER_SAMPLE, CHANNEL_COUNT};
use sensorbuf_common::sample::Sample;
use sensorbuf_store::{BufferCoordinator, ManualClock, RingBuffer};
use std::sync::Arc;

// Wide enough that push-time pruning never fires.
const NO_PRUNE_WINDOW: f64 = 1.0e9;

fn sample(ts: i64) -> Sample {
    Sample::new("prop", ts, [ts as f64; CHANNEL_COUNT])
}

fn timestamps(buffer: &RingBuffer) -> Vec<i64> {
    buffer.iter().map(|s| s.timestamp).collect()
}

/// Non-decreasing timestamp sequence built from random increments.
fn ascending(steps: &[i64]) -> Vec<i64> {
    steps
        .iter()
        .scan(0i64, |acc, step| {
            *acc += step;
            Some(*acc)
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_retains_last_capacity_samples(
        capacity in 1usize..200,
        pushes in 0usize..1000
    ) {
        let mut buffer = RingBuffer::new(capacity, NO_PRUNE_WINDOW).unwrap();
        for i in 0..pushes {
            buffer.push(sample(i as i64), 0);
        }

        let expected_len = pushes.min(capacity);
        prop_assert_eq!(buffer.len(), expected_len);

        let expected: Vec<i64> = ((pushes - expected_len)..pushes).map(|i| i as i64).collect();
        prop_assert_eq!(timestamps(&buffer), expected);
        prop_assert_eq!(buffer.counters().overwritten as usize, pushes - expected_len);
    }

    #[test]
    fn prop_time_window_matches_filter(
        capacity in 1usize..100,
        steps in prop::collection::vec(0i64..50, 0..300),
        reference in 0i64..20_000,
        window_ms in 0u32..10_000
    ) {
        let mut buffer = RingBuffer::new(capacity, NO_PRUNE_WINDOW).unwrap();
        for ts in ascending(&steps) {
            buffer.push(sample(ts), 0);
        }

        let window_seconds = f64::from(window_ms) / 1000.0;
        let cutoff = reference - (window_seconds * 1000.0) as i64;
        let expected: Vec<i64> = timestamps(&buffer)
            .into_iter()
            .filter(|&ts| ts >= cutoff)
            .collect();

        let window: Vec<i64> = buffer
            .get_time_window(reference, Some(window_seconds))
            .iter()
            .map(|s| s.timestamp)
            .collect();
        prop_assert_eq!(window, expected);
    }

    #[test]
    fn prop_recent_is_suffix_of_all(
        capacity in 1usize..100,
        pushes in 0usize..300,
        count in 0usize..150
    ) {
        let mut buffer = RingBuffer::new(capacity, NO_PRUNE_WINDOW).unwrap();
        for i in 0..pushes {
            buffer.push(sample(i as i64), 0);
        }

        let all = buffer.get_all();
        let recent = buffer.get_recent(count);
        prop_assert_eq!(recent.len(), count.min(all.len()));
        prop_assert_eq!(&all[all.len() - recent.len()..], &recent[..]);
    }

    #[test]
    fn prop_prune_removes_only_older_prefix(
        capacity in 1usize..100,
        steps in prop::collection::vec(0i64..50, 1..300),
        cutoff in 0i64..10_000
    ) {
        let mut buffer = RingBuffer::new(capacity, NO_PRUNE_WINDOW).unwrap();
        for ts in ascending(&steps) {
            buffer.push(sample(ts), 0);
        }
        let before = timestamps(&buffer);

        let removed = buffer.prune_older_than(cutoff);
        let after = timestamps(&buffer);

        prop_assert_eq!(removed, before.iter().filter(|&&ts| ts < cutoff).count());
        prop_assert!(after.iter().all(|&ts| ts >= cutoff));
        prop_assert_eq!(&before[removed..], &after[..]);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Threshold sits between the compaction target and one full buffer, so
    /// every overflow forces exactly one compaction back under it.
    #[test]
    fn prop_compaction_bounds_memory(
        capacity in 2usize..200,
        threshold_fraction in 0.0f64..1.0,
        pushes in 1usize..600
    ) {
        let floor_bytes = (capacity / 2) * BYTES_PER_SAMPLE;
        let full_bytes = capacity * BYTES_PER_SAMPLE;
        let threshold = floor_bytes + ((full_bytes - floor_bytes) as f64 * threshold_fraction) as usize;
        prop_assume!(threshold < full_bytes);

        let config = BufferConfig {
            per_source_capacity: capacity,
            memory_threshold_bytes: threshold,
            cleanup_interval_ms: 3_600_000,
            window_seconds: NO_PRUNE_WINDOW,
        };
        let coordinator = BufferCoordinator::with_clock(config, Arc::new(ManualClock::new(0))).unwrap();

        for i in 0..pushes {
            coordinator.append("prop", sample(i as i64));
            prop_assert!(coordinator.memory_usage() <= threshold);
        }

        let retained: Vec<i64> = coordinator.get_all("prop").iter().map(|s| s.timestamp).collect();
        prop_assert!(!retained.is_empty());
        prop_assert!(retained.len() <= capacity);

        // Newest contiguous suffix of everything pushed.
        let first = (pushes - retained.len()) as i64;
        let expected: Vec<i64> = (first..pushes as i64).collect();
        prop_assert_eq!(retained, expected);

        coordinator.shutdown();
    }
}
