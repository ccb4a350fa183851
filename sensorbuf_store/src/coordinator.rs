//! Multi-source buffer coordinator
//!
//! Owns one [`RingBuffer`] per source, keeps an aggregate memory estimate and
//! evicts in two ways:
//!
//! - **Periodic tick**: a self-throttling prune pass on a fixed interval,
//!   driven by an owned [`TickScheduler`].
//! - **Emergency compaction**: when an append pushes the aggregate estimate
//!   over `memory_threshold_bytes`, every buffer is cut down to its most
//!   recent `capacity * COMPACTION_RETAIN_RATIO` samples before `append`
//!   returns.
//!
//! ## Thread Safety
//!
//! A single coordinator-wide mutex guards the source map and counters. Every
//! public operation takes it once, so appends and reads on a source are atomic
//! with respect to each other. Queries return copies, never references into
//! storage. The tick thread only holds a `Weak` reference to the state.

use crate::clock::{Clock, MonotonicClock};
use crate::error::BufferResult;
use crate::ring::{PushOutcome, RingBuffer};
use crate::scheduler::TickScheduler;
use crate::stats::{GlobalStats, SourceStats};
use parking_lot::Mutex;
use sensorbuf_common::config::BufferConfig;
use sensorbuf_common::consts::COMPACTION_RETAIN_RATIO;
use sensorbuf_common::sample::{Sample, SourceId};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

const TICK_THREAD_NAME: &str = "sensorbuf-cleanup";

/// Result of a maintenance tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Less than half an interval since the last cleanup; nothing done
    Skipped,
    /// Prune pass completed
    Ran {
        /// Samples removed by age
        pruned: usize,
    },
}

struct CoordinatorState {
    config: BufferConfig,
    buffers: HashMap<SourceId, RingBuffer>,
    memory_usage: usize,
    last_cleanup_at: Option<u64>,
    emergency_compactions: u64,
    cleanup_runs: u64,
}

impl CoordinatorState {
    fn new(config: BufferConfig) -> Self {
        Self {
            config,
            buffers: HashMap::new(),
            memory_usage: 0,
            last_cleanup_at: None,
            emergency_compactions: 0,
            cleanup_runs: 0,
        }
    }

    fn recompute_memory(&mut self) {
        self.memory_usage = self
            .buffers
            .values()
            .map(RingBuffer::estimated_memory_bytes)
            .sum();
    }

    fn append(&mut self, source_id: &str, sample: Sample, now: u64) -> PushOutcome {
        let outcome = match self.buffers.get_mut(source_id) {
            Some(buffer) => buffer.push(sample, now),
            None => {
                let mut buffer = RingBuffer::from_config(&self.config);
                debug!(
                    source = source_id,
                    capacity = buffer.capacity(),
                    window_seconds = buffer.window_seconds(),
                    "Created buffer for new source"
                );
                let outcome = buffer.push(sample, now);
                self.buffers.insert(Arc::from(source_id), buffer);
                outcome
            }
        };

        self.recompute_memory();
        if self.memory_usage > self.config.memory_threshold_bytes {
            self.emergency_compact(now);
        }
        outcome
    }

    /// Cut every buffer to its newest `floor(capacity * COMPACTION_RETAIN_RATIO)`
    /// samples. The target follows each buffer's own capacity, which may predate
    /// the current config.
    fn emergency_compact(&mut self, now: u64) {
        let before = self.memory_usage;
        let mut dropped = 0;

        for buffer in self.buffers.values_mut() {
            let keep = (buffer.capacity() as f64 * COMPACTION_RETAIN_RATIO).floor() as usize;
            dropped += buffer.compact(keep);
        }

        self.recompute_memory();
        self.emergency_compactions += 1;
        self.last_cleanup_at = Some(now);

        warn!(
            before_bytes = before,
            after_bytes = self.memory_usage,
            threshold_bytes = self.config.memory_threshold_bytes,
            dropped,
            sources = self.buffers.len(),
            "Memory threshold exceeded, emergency compaction"
        );
        if self.memory_usage > self.config.memory_threshold_bytes {
            warn!(
                after_bytes = self.memory_usage,
                "Estimate still above threshold after compaction"
            );
        }
    }

    fn tick(&mut self, now: u64) -> TickOutcome {
        let half_interval = self.config.cleanup_interval_ms / 2;
        if let Some(last) = self.last_cleanup_at {
            if now.saturating_sub(last) < half_interval {
                return TickOutcome::Skipped;
            }
        }

        // Idle sources age out relative to the newest sample of any source.
        let stream_newest = self
            .buffers
            .values()
            .filter_map(RingBuffer::newest_timestamp)
            .max();

        let mut pruned = 0;
        if let Some(newest) = stream_newest {
            for buffer in self.buffers.values_mut() {
                pruned += buffer.prune_older_than(newest.saturating_sub(buffer.window_ms()));
            }
        }

        self.recompute_memory();
        self.last_cleanup_at = Some(now);
        self.cleanup_runs += 1;

        debug!(
            pruned,
            memory_bytes = self.memory_usage,
            sources = self.buffers.len(),
            "Cleanup tick"
        );
        TickOutcome::Ran { pruned }
    }

    fn source_stats(id: &str, buffer: &RingBuffer) -> SourceStats {
        SourceStats {
            source_id: id.to_string(),
            buffer: buffer.stats(),
            utilization: buffer.utilization(),
            data_rate_hz: buffer.data_rate_hz(),
            window_seconds: buffer.window_seconds(),
            counters: buffer.counters(),
        }
    }
}

struct Inner {
    state: Mutex<CoordinatorState>,
    clock: Arc<dyn Clock>,
}

impl Inner {
    fn tick(&self) -> TickOutcome {
        let now = self.clock.now_ms();
        self.state.lock().tick(now)
    }
}

/// Routes samples to per-source ring buffers and bounds their total memory.
///
/// # Example
///
/// ```rust
/// use sensorbuf_common::config::BufferConfig;
/// use sensorbuf_common::sample::Sample;
/// use sensorbuf_store::BufferCoordinator;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let coordinator = BufferCoordinator::new(BufferConfig::default())?;
/// coordinator.append("dev-1", Sample::new("dev-1", 0, [0.0; 6]));
/// assert_eq!(coordinator.get_all("dev-1").len(), 1);
/// coordinator.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct BufferCoordinator {
    inner: Arc<Inner>,
    scheduler: Mutex<Option<TickScheduler>>,
}

impl BufferCoordinator {
    /// Create a coordinator on the process monotonic clock and start its tick.
    pub fn new(config: BufferConfig) -> BufferResult<Self> {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    /// Create a coordinator on a caller-supplied clock and start its tick.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the configuration fails validation, `Scheduler` if
    /// the tick thread cannot be spawned.
    pub fn with_clock(config: BufferConfig, clock: Arc<dyn Clock>) -> BufferResult<Self> {
        config.validate()?;

        let inner = Arc::new(Inner {
            state: Mutex::new(CoordinatorState::new(config.clone())),
            clock,
        });
        let scheduler = Self::start_scheduler(&inner, &config)?;

        info!(
            capacity = config.per_source_capacity,
            threshold_bytes = config.memory_threshold_bytes,
            interval_ms = config.cleanup_interval_ms,
            window_seconds = config.window_seconds,
            "Buffer coordinator started"
        );

        Ok(Self {
            inner,
            scheduler: Mutex::new(Some(scheduler)),
        })
    }

    fn start_scheduler(inner: &Arc<Inner>, config: &BufferConfig) -> BufferResult<TickScheduler> {
        let weak: Weak<Inner> = Arc::downgrade(inner);
        TickScheduler::start(TICK_THREAD_NAME, config.cleanup_interval(), move || {
            match weak.upgrade() {
                Some(inner) => {
                    inner.tick();
                    ControlFlow::Continue(())
                }
                None => ControlFlow::Break(()),
            }
        })
    }

    /// Append one sample, creating the source's buffer on first use.
    ///
    /// Runs emergency compaction synchronously when the aggregate estimate
    /// crosses the memory threshold.
    pub fn append(&self, source_id: &str, sample: Sample) -> PushOutcome {
        let now = self.inner.clock.now_ms();
        self.inner.state.lock().append(source_id, sample, now)
    }

    /// Samples within `window_seconds` of the source's newest sample.
    ///
    /// Unknown or empty source yields an empty vector.
    pub fn get_time_window(&self, source_id: &str, window_seconds: Option<f64>) -> Vec<Sample> {
        let state = self.inner.state.lock();
        state
            .buffers
            .get(source_id)
            .and_then(|buffer| {
                buffer
                    .newest_timestamp()
                    .map(|newest| buffer.get_time_window(newest, window_seconds))
            })
            .unwrap_or_default()
    }

    /// Samples within `window_seconds` of an explicit reference timestamp.
    pub fn get_time_window_at(
        &self,
        source_id: &str,
        reference_timestamp: i64,
        window_seconds: Option<f64>,
    ) -> Vec<Sample> {
        let state = self.inner.state.lock();
        state
            .buffers
            .get(source_id)
            .map(|buffer| buffer.get_time_window(reference_timestamp, window_seconds))
            .unwrap_or_default()
    }

    /// The last `count` samples of a source, ascending.
    pub fn get_recent(&self, source_id: &str, count: usize) -> Vec<Sample> {
        let state = self.inner.state.lock();
        state
            .buffers
            .get(source_id)
            .map(|buffer| buffer.get_recent(count))
            .unwrap_or_default()
    }

    /// Every retained sample of a source, ascending.
    pub fn get_all(&self, source_id: &str) -> Vec<Sample> {
        let state = self.inner.state.lock();
        state
            .buffers
            .get(source_id)
            .map(RingBuffer::get_all)
            .unwrap_or_default()
    }

    /// Drop a source's buffer. Returns `false` if the source was unknown.
    pub fn remove_source(&self, source_id: &str) -> bool {
        let mut state = self.inner.state.lock();
        let Some(mut buffer) = state.buffers.remove(source_id) else {
            return false;
        };
        buffer.clear();
        state.recompute_memory();
        info!(source = source_id, "Removed source");
        true
    }

    /// Drop every buffer.
    pub fn clear_all(&self) {
        let mut state = self.inner.state.lock();
        let sources = state.buffers.len();
        for buffer in state.buffers.values_mut() {
            buffer.clear();
        }
        state.buffers.clear();
        state.memory_usage = 0;
        if sources > 0 {
            info!(sources, "Cleared all sources");
        }
    }

    /// Aggregate statistics across every source.
    pub fn global_stats(&self) -> GlobalStats {
        let (sources, compactions, runs) = {
            let state = self.inner.state.lock();
            let sources: Vec<SourceStats> = state
                .buffers
                .iter()
                .map(|(id, buffer)| CoordinatorState::source_stats(id, buffer))
                .collect();
            (sources, state.emergency_compactions, state.cleanup_runs)
        };
        GlobalStats::aggregate(sources, compactions, runs)
    }

    /// Statistics for one source.
    pub fn source_stats(&self, source_id: &str) -> Option<SourceStats> {
        let state = self.inner.state.lock();
        state
            .buffers
            .get(source_id)
            .map(|buffer| CoordinatorState::source_stats(source_id, buffer))
    }

    /// Active source ids, sorted.
    pub fn source_ids(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        let mut ids: Vec<String> = state.buffers.keys().map(|id| id.to_string()).collect();
        ids.sort();
        ids
    }

    /// Cached aggregate memory estimate.
    pub fn memory_usage(&self) -> usize {
        self.inner.state.lock().memory_usage
    }

    /// Current configuration.
    pub fn config(&self) -> BufferConfig {
        self.inner.state.lock().config.clone()
    }

    /// Maintenance pass. No-op within half an interval of the last cleanup.
    pub fn periodic_tick(&self) -> TickOutcome {
        self.inner.tick()
    }

    /// Run the tick logic on demand (e.g. from a debug panel).
    pub fn force_cleanup(&self) -> TickOutcome {
        let outcome = self.periodic_tick();
        debug!(?outcome, "Forced cleanup");
        outcome
    }

    /// Replace the configuration and restart the tick with its interval.
    ///
    /// Buffers that already exist keep their capacity and window.
    pub fn update_config(&self, config: BufferConfig) -> BufferResult<()> {
        config.validate()?;

        let mut scheduler = self.scheduler.lock();
        if let Some(mut old) = scheduler.take() {
            old.stop();
        }

        self.inner.state.lock().config = config.clone();
        *scheduler = Some(Self::start_scheduler(&self.inner, &config)?);

        info!(
            capacity = config.per_source_capacity,
            threshold_bytes = config.memory_threshold_bytes,
            interval_ms = config.cleanup_interval_ms,
            window_seconds = config.window_seconds,
            "Buffer configuration updated"
        );
        Ok(())
    }

    /// Period of the running tick, `None` after `shutdown`.
    pub fn tick_interval(&self) -> Option<Duration> {
        self.scheduler.lock().as_ref().map(TickScheduler::interval)
    }

    /// `true` while the periodic tick is active.
    pub fn is_ticking(&self) -> bool {
        self.scheduler
            .lock()
            .as_ref()
            .is_some_and(TickScheduler::is_running)
    }

    /// Stop the periodic tick. Idempotent; also run on drop.
    pub fn shutdown(&self) {
        if let Some(mut scheduler) = self.scheduler.lock().take() {
            scheduler.stop();
            info!("Buffer coordinator stopped");
        }
    }
}

impl Drop for BufferCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for BufferCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("BufferCoordinator")
            .field("sources", &state.buffers.len())
            .field("memory_usage", &state.memory_usage)
            .field("config", &state.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use sensorbuf_common::consts::{BYTES_PER_SAMPLE, CHANNEL_COUNT};

    fn config(capacity: usize) -> BufferConfig {
        BufferConfig {
            per_source_capacity: capacity,
            memory_threshold_bytes: 1024 * 1024,
            cleanup_interval_ms: 60_000,
            window_seconds: 10.0,
        }
    }

    fn sample(source: &str, ts: i64) -> Sample {
        Sample::new(source, ts, [0.0; CHANNEL_COUNT])
    }

    fn coordinator(config: BufferConfig) -> (BufferCoordinator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let coordinator = BufferCoordinator::with_clock(config, clock.clone()).unwrap();
        (coordinator, clock)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = BufferCoordinator::new(BufferConfig {
            cleanup_interval_ms: 0,
            ..config(10)
        });
        assert!(matches!(
            result,
            Err(crate::error::BufferError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_creates_buffer_lazily() {
        let (coordinator, _) = coordinator(config(10));
        assert!(coordinator.source_ids().is_empty());

        assert_eq!(coordinator.append("a", sample("a", 1)), PushOutcome::Stored);
        assert_eq!(coordinator.source_ids(), vec!["a".to_string()]);
        assert_eq!(coordinator.memory_usage(), BYTES_PER_SAMPLE);
    }

    #[test]
    fn test_unknown_source_reads_are_empty() {
        let (coordinator, _) = coordinator(config(10));
        assert!(coordinator.get_all("nope").is_empty());
        assert!(coordinator.get_recent("nope", 5).is_empty());
        assert!(coordinator.get_time_window("nope", None).is_empty());
        assert!(coordinator.get_time_window_at("nope", 0, Some(1.0)).is_empty());
        assert!(coordinator.source_stats("nope").is_none());
        assert!(!coordinator.remove_source("nope"));
    }

    #[test]
    fn test_time_window_relative_to_newest() {
        let (coordinator, _) = coordinator(config(100));
        for ts in (0..20_000).step_by(1000) {
            coordinator.append("a", sample("a", ts));
        }
        let window = coordinator.get_time_window("a", Some(5.0));
        assert_eq!(window.first().unwrap().timestamp, 14_000);
        assert_eq!(window.last().unwrap().timestamp, 19_000);
    }

    #[test]
    fn test_emergency_compaction_halves_buffers() {
        let (coordinator, _) = coordinator(BufferConfig {
            memory_threshold_bytes: 15 * BYTES_PER_SAMPLE,
            ..config(10)
        });

        for ts in 0..10 {
            coordinator.append("a", sample("a", ts));
        }
        for ts in 0..5 {
            coordinator.append("b", sample("b", ts));
        }
        assert_eq!(coordinator.global_stats().emergency_compactions, 0);

        // 16th sample crosses the threshold.
        coordinator.append("b", sample("b", 5));
        let stats = coordinator.global_stats();
        assert_eq!(stats.emergency_compactions, 1);
        assert_eq!(stats.per_source["a"].buffer.size, 5);
        assert_eq!(stats.per_source["b"].buffer.size, 5);
        assert!(coordinator.memory_usage() <= 15 * BYTES_PER_SAMPLE);

        let a: Vec<i64> = coordinator.get_all("a").iter().map(|s| s.timestamp).collect();
        assert_eq!(a, vec![5, 6, 7, 8, 9]);
        let b: Vec<i64> = coordinator.get_all("b").iter().map(|s| s.timestamp).collect();
        assert_eq!(b, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_tick_deduplicates_within_half_interval() {
        let (coordinator, clock) = coordinator(config(10));
        coordinator.append("a", sample("a", 0));

        assert!(matches!(coordinator.periodic_tick(), TickOutcome::Ran { .. }));
        clock.advance(29_999);
        assert_eq!(coordinator.periodic_tick(), TickOutcome::Skipped);
        clock.advance(1);
        assert!(matches!(coordinator.force_cleanup(), TickOutcome::Ran { .. }));
        assert_eq!(coordinator.global_stats().cleanup_runs, 2);
    }

    #[test]
    fn test_tick_after_compaction_is_skipped() {
        let (coordinator, _) = coordinator(BufferConfig {
            memory_threshold_bytes: 4 * BYTES_PER_SAMPLE,
            ..config(10)
        });
        for ts in 0..5 {
            coordinator.append("a", sample("a", ts));
        }
        assert_eq!(coordinator.global_stats().emergency_compactions, 1);
        assert_eq!(coordinator.force_cleanup(), TickOutcome::Skipped);
    }

    #[test]
    fn test_tick_prunes_idle_sources_against_stream_time() {
        let (coordinator, _) = coordinator(config(100));
        coordinator.append("idle", sample("idle", 0));
        coordinator.append("idle", sample("idle", 1000));
        coordinator.append("live", sample("live", 0));
        coordinator.append("live", sample("live", 10_500));

        // Window 10 s, stream newest 10.5 s: cutoff 500 ms for every source.
        assert_eq!(coordinator.periodic_tick(), TickOutcome::Ran { pruned: 2 });
        assert_eq!(coordinator.get_all("idle").len(), 1);
        assert_eq!(coordinator.get_all("live").len(), 1);
        assert_eq!(coordinator.memory_usage(), 2 * BYTES_PER_SAMPLE);
    }

    #[test]
    fn test_update_config_keeps_existing_capacity() {
        let (coordinator, _) = coordinator(config(10));
        coordinator.append("old", sample("old", 0));

        coordinator.update_config(config(20)).unwrap();
        coordinator.append("new", sample("new", 0));

        let stats = coordinator.global_stats();
        assert_eq!(stats.per_source["old"].buffer.capacity, 10);
        assert_eq!(stats.per_source["new"].buffer.capacity, 20);
        assert_eq!(coordinator.config().per_source_capacity, 20);
        assert!(coordinator.is_ticking());
    }

    #[test]
    fn test_update_config_restarts_tick_with_new_interval() {
        let (coordinator, _) = coordinator(BufferConfig {
            cleanup_interval_ms: 3_600_000,
            ..config(10)
        });
        coordinator.append("a", sample("a", 0));
        assert_eq!(coordinator.tick_interval(), Some(Duration::from_secs(3600)));

        coordinator
            .update_config(BufferConfig {
                cleanup_interval_ms: 10,
                ..config(10)
            })
            .unwrap();
        assert_eq!(coordinator.tick_interval(), Some(Duration::from_millis(10)));

        let mut waited = 0;
        while coordinator.global_stats().cleanup_runs == 0 && waited < 200 {
            std::thread::sleep(Duration::from_millis(10));
            waited += 1;
        }
        assert!(coordinator.global_stats().cleanup_runs > 0);

        coordinator.shutdown();
        assert_eq!(coordinator.tick_interval(), None);
    }

    #[test]
    fn test_compaction_target_follows_each_buffer_capacity() {
        let (coordinator, _) = coordinator(config(10));
        for ts in 0..10 {
            coordinator.append("old", sample("old", ts));
        }

        coordinator
            .update_config(BufferConfig {
                memory_threshold_bytes: 30 * BYTES_PER_SAMPLE,
                ..config(40)
            })
            .unwrap();
        for ts in 0..21 {
            coordinator.append("new", sample("new", ts));
        }

        let stats = coordinator.global_stats();
        assert_eq!(stats.emergency_compactions, 1);
        assert_eq!(stats.per_source["old"].buffer.size, 5);
        assert_eq!(stats.per_source["new"].buffer.size, 20);
    }

    #[test]
    fn test_huge_window_append_and_query_do_not_overflow() {
        let (coordinator, clock) = coordinator(BufferConfig {
            window_seconds: 1.0e17,
            ..config(10)
        });

        assert_eq!(coordinator.append("a", sample("a", -5)), PushOutcome::Stored);
        clock.advance(1000);
        assert_eq!(coordinator.append("a", sample("a", -1)), PushOutcome::Stored);

        assert_eq!(coordinator.get_time_window("a", None).len(), 2);
        assert_eq!(coordinator.get_time_window_at("a", i64::MIN + 1, None).len(), 2);
        assert!(matches!(coordinator.periodic_tick(), TickOutcome::Ran { pruned: 0 }));
        assert_eq!(coordinator.get_all("a").len(), 2);
    }

    #[test]
    fn test_update_config_rejects_invalid() {
        let (coordinator, _) = coordinator(config(10));
        let result = coordinator.update_config(BufferConfig {
            window_seconds: -1.0,
            ..config(10)
        });
        assert!(result.is_err());
        assert_eq!(coordinator.config(), config(10));
        assert!(coordinator.is_ticking());
    }

    #[test]
    fn test_clear_all_resets_memory() {
        let (coordinator, _) = coordinator(config(10));
        coordinator.append("a", sample("a", 0));
        coordinator.append("b", sample("b", 0));
        coordinator.clear_all();

        let stats = coordinator.global_stats();
        assert_eq!(stats.total_sources, 0);
        assert_eq!(stats.total_memory_bytes, 0);
        assert_eq!(coordinator.memory_usage(), 0);

        // Clearing an empty coordinator is a no-op.
        coordinator.clear_all();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (coordinator, _) = coordinator(config(10));
        assert!(coordinator.is_ticking());
        coordinator.shutdown();
        assert!(!coordinator.is_ticking());
        coordinator.shutdown();

        // Appends and reads still work without the tick.
        coordinator.append("a", sample("a", 0));
        assert_eq!(coordinator.get_all("a").len(), 1);
    }
}
