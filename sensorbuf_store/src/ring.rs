//! Fixed-capacity circular sample store for one source
//!
//! Slots are allocated once at construction. `head` is the next write slot,
//! `tail` the oldest retained sample, and `head == (tail + size) % capacity`
//! holds after every operation. A push into a full buffer overwrites the slot
//! at `tail` (FIFO eviction by capacity).
//!
//! Age pruning removes a contiguous prefix starting at `tail`, which is only
//! correct while timestamps are non-decreasing. `push` therefore rejects any
//! sample older than the newest retained one.

use crate::error::{BufferError, BufferResult};
use crate::stats::{BufferStats, RingCounters};
use sensorbuf_common::config::BufferConfig;
use sensorbuf_common::consts::{BYTES_PER_SAMPLE, PRUNE_THROTTLE_MS};
use sensorbuf_common::sample::Sample;
use tracing::{debug, trace};

/// Result of a single [`RingBuffer::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Written into a free slot
    Stored,
    /// Written over the oldest retained sample
    Overwrote,
    /// Refused: timestamp older than the newest retained sample
    RejectedOutOfOrder,
}

/// Circular buffer of samples with age-based self-pruning.
#[derive(Debug)]
pub struct RingBuffer {
    slots: Vec<Option<Sample>>,
    capacity: usize,
    head: usize,
    tail: usize,
    size: usize,
    window_seconds: f64,
    window_ms: i64,
    next_prune_at: u64,
    counters: RingCounters,
}

/// Window length in ms. The float-to-int cast saturates at the `i64` bounds.
fn seconds_to_ms(seconds: f64) -> i64 {
    (seconds * 1000.0) as i64
}

impl RingBuffer {
    /// Create an empty buffer.
    ///
    /// # Errors
    ///
    /// `InvalidCapacity` for a zero capacity, `InvalidWindow` for a window that
    /// is not a positive finite number.
    pub fn new(capacity: usize, window_seconds: f64) -> BufferResult<Self> {
        if capacity == 0 {
            return Err(BufferError::InvalidCapacity { capacity });
        }
        if !window_seconds.is_finite() || window_seconds <= 0.0 {
            return Err(BufferError::InvalidWindow { window_seconds });
        }
        Ok(Self::allocate(capacity, window_seconds))
    }

    /// Buffer sized from an already validated coordinator config.
    pub(crate) fn from_config(config: &BufferConfig) -> Self {
        debug_assert!(config.validate().is_ok());
        Self::allocate(config.per_source_capacity, config.window_seconds)
    }

    fn allocate(capacity: usize, window_seconds: f64) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            capacity,
            head: 0,
            tail: 0,
            size: 0,
            window_seconds,
            window_ms: seconds_to_ms(window_seconds),
            next_prune_at: 0,
            counters: RingCounters::default(),
        }
    }

    /// Append a sample.
    ///
    /// `now_ms` is process time from a [`Clock`](crate::clock::Clock); age
    /// pruning runs at most once per `PRUNE_THROTTLE_MS` of it.
    pub fn push(&mut self, sample: Sample, now_ms: u64) -> PushOutcome {
        if let Some(newest) = self.newest_timestamp() {
            if sample.timestamp < newest {
                self.counters.rejected += 1;
                debug!(
                    source = %sample.source_id,
                    timestamp = sample.timestamp,
                    newest,
                    "Rejected out-of-order sample"
                );
                return PushOutcome::RejectedOutOfOrder;
            }
        }

        let outcome = self.write(sample);
        self.counters.total_pushed += 1;
        if outcome == PushOutcome::Overwrote {
            self.counters.overwritten += 1;
        }

        if now_ms >= self.next_prune_at {
            self.next_prune_at = now_ms.saturating_add(PRUNE_THROTTLE_MS);
            if let Some(newest) = self.newest_timestamp() {
                self.prune_older_than(newest.saturating_sub(self.window_ms));
            }
        }

        outcome
    }

    /// Raw slot write, no ordering check and no counters.
    fn write(&mut self, sample: Sample) -> PushOutcome {
        let outcome = if self.size == self.capacity {
            self.tail = (self.tail + 1) % self.capacity;
            PushOutcome::Overwrote
        } else {
            self.size += 1;
            PushOutcome::Stored
        };

        self.slots[self.head] = Some(sample);
        self.head = (self.head + 1) % self.capacity;
        outcome
    }

    /// Retained samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        (0..self.size).filter_map(move |i| self.slots[(self.tail + i) % self.capacity].as_ref())
    }

    /// Samples with `timestamp >= reference - window * 1000`, ascending.
    ///
    /// `window_seconds` defaults to the buffer's configured window.
    pub fn get_time_window(&self, reference_timestamp: i64, window_seconds: Option<f64>) -> Vec<Sample> {
        let window_ms = window_seconds.map_or(self.window_ms, seconds_to_ms);
        let cutoff = reference_timestamp.saturating_sub(window_ms);

        let mut samples: Vec<Sample> = self
            .iter()
            .filter(|s| s.timestamp >= cutoff)
            .cloned()
            .collect();
        samples.sort_by_key(|s| s.timestamp);
        samples
    }

    /// The last `min(count, len)` samples, ascending.
    pub fn get_recent(&self, count: usize) -> Vec<Sample> {
        let n = count.min(self.size);
        self.iter().skip(self.size - n).cloned().collect()
    }

    /// Every retained sample, ascending.
    pub fn get_all(&self) -> Vec<Sample> {
        self.iter().cloned().collect()
    }

    /// Drop the prefix of samples older than `cutoff_timestamp`.
    ///
    /// Stops at the first sample that is not older. Returns the number removed.
    pub fn prune_older_than(&mut self, cutoff_timestamp: i64) -> usize {
        let mut removed = 0;

        while self.size > 0 {
            match &self.slots[self.tail] {
                Some(sample) if sample.timestamp < cutoff_timestamp => {
                    self.slots[self.tail] = None;
                    self.tail = (self.tail + 1) % self.capacity;
                    self.size -= 1;
                    removed += 1;
                }
                _ => break,
            }
        }

        if removed > 0 {
            self.counters.pruned += removed as u64;
            trace!(removed, cutoff_timestamp, remaining = self.size, "Pruned aged samples");
        }
        removed
    }

    /// Keep only the most recent `keep` samples. Returns the number dropped.
    pub fn compact(&mut self, keep: usize) -> usize {
        let retained = self.get_recent(keep);
        let dropped = self.size - retained.len();

        self.clear();
        for sample in retained {
            self.write(sample);
        }
        dropped
    }

    /// Snapshot. Counts and timestamps are zero when empty.
    ///
    /// Retained timestamps are non-decreasing from `tail`, so the bounds are
    /// the two ends of the ring.
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            size: self.size,
            capacity: self.capacity,
            estimated_memory_bytes: self.estimated_memory_bytes(),
            oldest_timestamp: self.oldest_timestamp().unwrap_or(0),
            newest_timestamp: self.newest_timestamp().unwrap_or(0),
        }
    }

    /// Release every slot and reset the cursors. Lifetime counters are kept.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.tail = 0;
        self.size = 0;
        self.next_prune_at = 0;
    }

    /// Timestamp of the most recently written sample.
    pub fn newest_timestamp(&self) -> Option<i64> {
        if self.size == 0 {
            return None;
        }
        let last = (self.head + self.capacity - 1) % self.capacity;
        self.slots[last].as_ref().map(|s| s.timestamp)
    }

    /// Timestamp of the oldest retained sample.
    pub fn oldest_timestamp(&self) -> Option<i64> {
        if self.size == 0 {
            return None;
        }
        self.slots[self.tail].as_ref().map(|s| s.timestamp)
    }

    /// Heuristic footprint of the retained samples.
    pub fn estimated_memory_bytes(&self) -> usize {
        self.size * BYTES_PER_SAMPLE
    }

    /// Retained sample count.
    pub fn len(&self) -> usize {
        self.size
    }

    /// `true` when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// `true` when the next push overwrites.
    pub fn is_full(&self) -> bool {
        self.size == self.capacity
    }

    /// Slot count fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured sliding window (s).
    pub fn window_seconds(&self) -> f64 {
        self.window_seconds
    }

    /// Configured sliding window (ms).
    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    /// `len / capacity`.
    pub fn utilization(&self) -> f64 {
        self.size as f64 / self.capacity as f64
    }

    /// Retained samples per second of retained span. Zero below two samples
    /// or for a zero-length span.
    pub fn data_rate_hz(&self) -> f64 {
        match (self.oldest_timestamp(), self.newest_timestamp()) {
            (Some(oldest), Some(newest)) if newest > oldest => {
                let span_seconds = newest.abs_diff(oldest) as f64 / 1000.0;
                self.size as f64 / span_seconds
            }
            _ => 0.0,
        }
    }

    /// Lifetime counters.
    pub fn counters(&self) -> RingCounters {
        self.counters
    }
}
