//! Chunk cache accounting and eviction core for a time-series metrics engine
//!
//! The engine caches decoded time-series chunks in memory to accelerate
//! query-path reads. This crate tracks per-chunk memory usage, records
//! recency of access, and triggers eviction when a configured byte budget
//! is exceeded, without introducing contention on the hot read/write paths:
//! - Non-blocking producers that shed events instead of applying backpressure
//! - A single serialized accountant task owning all mutable state
//! - Fragmentation-avoiding batched evictions, oldest chunks first
//! - Accurate byte totals under concurrent add/hit/delete traffic

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accounting;
pub mod config;
pub mod error;
pub mod metrics;
pub mod types;

// Re-export main types
pub use accounting::{Accountant, Accounting, AccountingStatsSnapshot, CacheEvent};
pub use config::AccountingConfig;
pub use error::{AccountingError, Error, Result};
pub use types::{ChunkId, MetricKey};
