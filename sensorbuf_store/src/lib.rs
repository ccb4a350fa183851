//! # SensorBuf Store
//!
//! Bounded, per-source sample buffering for high-frequency multi-channel
//! sensor streams. Each source gets a fixed-capacity ring buffer; a
//! coordinator routes samples, tracks an aggregate memory estimate and evicts
//! proactively (periodic tick) and reactively (emergency compaction).
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────────────┐    ┌─────────────────┐
//! │   Producers     │    │    BufferCoordinator     │    │   Consumers     │
//! │ (transport)     │    │                          │    │ (charts/export) │
//! │ append(id, s)   ├───►│ source_id ─► RingBuffer  ├───►│ get_time_window │
//! │                 │    │ memory estimate          │    │ get_recent/all  │
//! └─────────────────┘    │ emergency compaction     │    │ global_stats    │
//!                        └────────────▲─────────────┘    └─────────────────┘
//!                                     │ periodic_tick
//!                        ┌────────────┴─────────────┐
//!                        │      TickScheduler       │
//!                        │ (owned thread, Weak ref) │
//!                        └──────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use sensorbuf_common::config::BufferConfig;
//! use sensorbuf_common::sample::Sample;
//! use sensorbuf_store::BufferCoordinator;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BufferConfig {
//!     per_source_capacity: 500,
//!     ..BufferConfig::default()
//! };
//! let coordinator = BufferCoordinator::new(config)?;
//!
//! for i in 0..1000 {
//!     coordinator.append("dev-1", Sample::new("dev-1", i * 10, [0.0; 6]));
//! }
//!
//! let all = coordinator.get_all("dev-1");
//! assert_eq!(all.len(), 500);
//! assert_eq!(all[0].timestamp, 5000);
//!
//! let stats = coordinator.global_stats();
//! assert_eq!(stats.total_sources, 1);
//!
//! coordinator.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Only construction and reconfiguration can fail ([`BufferError`]). Reads
//! of unknown sources return empty results; removing an unknown source is a
//! no-op; memory pressure is handled by eviction, never reported as an error.
//!
//! ## Thread Safety
//!
//! - **BufferCoordinator**: `Send + Sync`, one internal lock; share via `Arc`
//! - **RingBuffer**: plain owned value, not shared
//! - **TickScheduler**: owned by the coordinator, stopped on `shutdown`/drop

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod ring;
pub mod scheduler;
pub mod stats;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use coordinator::{BufferCoordinator, TickOutcome};
pub use error::{BufferError, BufferResult};
pub use ring::{PushOutcome, RingBuffer};
pub use scheduler::TickScheduler;
pub use stats::{BufferStats, GlobalStats, RingCounters, SourceStats};

/// Initialize tracing for library consumers and tests
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
