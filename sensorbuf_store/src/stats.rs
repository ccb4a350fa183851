//! Read-only statistics snapshots
//!
//! Every view is recomputed in full on request and reflects the state at call
//! time. Nothing here is stored by the coordinator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of one ring buffer. Everything but `capacity` is zero when empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BufferStats {
    /// Retained samples
    pub size: usize,
    /// Slot count
    pub capacity: usize,
    /// Heuristic footprint of the retained samples
    pub estimated_memory_bytes: usize,
    /// Smallest retained timestamp (ms)
    pub oldest_timestamp: i64,
    /// Largest retained timestamp (ms)
    pub newest_timestamp: i64,
}

/// Lifetime counters of one ring buffer. Survive `clear()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingCounters {
    /// Samples accepted by `push`
    pub total_pushed: u64,
    /// Samples evicted by capacity overwrite
    pub overwritten: u64,
    /// Samples evicted by age
    pub pruned: u64,
    /// Samples refused for arriving out of order
    pub rejected: u64,
}

/// Per-source view exposed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    /// Source key
    pub source_id: String,
    /// Buffer snapshot
    #[serde(flatten)]
    pub buffer: BufferStats,
    /// `size / capacity` in `[0, 1]`
    pub utilization: f64,
    /// Retained samples per second of retained span
    pub data_rate_hz: f64,
    /// Configured sliding window (s)
    pub window_seconds: f64,
    /// Lifetime counters
    pub counters: RingCounters,
}

/// Aggregate view across every source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    /// Number of active sources
    pub total_sources: usize,
    /// Retained samples across all sources
    pub total_samples: usize,
    /// Sum of per-source memory estimates
    pub total_memory_bytes: usize,
    /// Mean per-source utilization, zero without sources
    pub average_utilization: f64,
    /// Samples evicted by capacity overwrite across sources
    pub total_overwritten: u64,
    /// Samples refused as out of order across sources
    pub total_rejected: u64,
    /// Samples lost before aging out: `total_overwritten + total_rejected`
    pub total_dropped_samples: u64,
    /// Oldest retained timestamp across non-empty sources
    pub oldest_timestamp: Option<i64>,
    /// Newest retained timestamp across non-empty sources
    pub newest_timestamp: Option<i64>,
    /// Emergency compactions since construction
    pub emergency_compactions: u64,
    /// Completed (non-skipped) maintenance ticks since construction
    pub cleanup_runs: u64,
    /// Per-source detail, ordered by source id
    pub per_source: BTreeMap<String, SourceStats>,
}

impl GlobalStats {
    /// Aggregate per-source snapshots taken under the coordinator lock.
    pub fn aggregate(
        sources: Vec<SourceStats>,
        emergency_compactions: u64,
        cleanup_runs: u64,
    ) -> Self {
        let mut stats = GlobalStats {
            emergency_compactions,
            cleanup_runs,
            ..GlobalStats::default()
        };
        let mut utilization_sum = 0.0;

        for source in sources {
            stats.total_samples += source.buffer.size;
            stats.total_memory_bytes += source.buffer.estimated_memory_bytes;
            stats.total_overwritten += source.counters.overwritten;
            stats.total_rejected += source.counters.rejected;
            utilization_sum += source.utilization;

            if source.buffer.size > 0 {
                let oldest = source.buffer.oldest_timestamp;
                let newest = source.buffer.newest_timestamp;
                stats.oldest_timestamp = Some(stats.oldest_timestamp.map_or(oldest, |t| t.min(oldest)));
                stats.newest_timestamp = Some(stats.newest_timestamp.map_or(newest, |t| t.max(newest)));
            }

            stats.per_source.insert(source.source_id.clone(), source);
        }

        stats.total_sources = stats.per_source.len();
        stats.total_dropped_samples = stats.total_overwritten + stats.total_rejected;
        if stats.total_sources > 0 {
            stats.average_utilization = utilization_sum / stats.total_sources as f64;
        }
        stats
    }

    /// Source with the highest utilization, if any.
    pub fn busiest_source(&self) -> Option<&SourceStats> {
        self.per_source
            .values()
            .max_by(|a, b| a.utilization.total_cmp(&b.utilization))
    }
}
