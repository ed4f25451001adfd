//! Accounting counters
//!
//! Thread-safe counter collection for the accounting core. Uses atomic
//! operations for lock-free updates: every counter is written by the
//! accountant task and may be read concurrently by telemetry collectors or
//! the cache owner. Mutators mirror their values into the process-wide
//! Prometheus registry.

use crate::metrics;
use std::sync::atomic::{AtomicU64, Ordering};

/// Accounting counter collection
///
/// `size_used` is the authoritative "current bytes used" figure; it is only
/// ever written from the accountant task but is safe to read from anywhere.
#[derive(Debug, Default)]
pub struct AccountingStats {
    /// Configured size budget in bytes
    size_max: AtomicU64,
    /// Bytes currently accounted to cached chunks
    size_used: AtomicU64,
    /// Chunks added to the accounting
    chunks_added: AtomicU64,
    /// Chunks handed to the evict queue
    chunks_evicted: AtomicU64,
    /// Metrics seen for the first time
    metrics_added: AtomicU64,
    /// Metrics whose last chunk was evicted
    metrics_evicted: AtomicU64,
}

/// Snapshot of the accounting counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountingStatsSnapshot {
    /// Configured size budget in bytes
    pub size_max: u64,
    /// Bytes currently accounted to cached chunks
    pub size_used: u64,
    /// Chunks added to the accounting
    pub chunks_added: u64,
    /// Chunks handed to the evict queue
    pub chunks_evicted: u64,
    /// Metrics seen for the first time
    pub metrics_added: u64,
    /// Metrics whose last chunk was evicted
    pub metrics_evicted: u64,
}

impl AccountingStats {
    /// Create a new counter collection with everything at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configured size budget
    pub fn set_max(&self, bytes: u64) {
        self.size_max.store(bytes, Ordering::Relaxed);
        metrics::set_size_max(bytes);
    }

    /// Current size budget in bytes
    #[inline]
    pub fn max(&self) -> u64 {
        self.size_max.load(Ordering::Relaxed)
    }

    /// Current accounted bytes
    #[inline]
    pub fn used(&self) -> u64 {
        self.size_used.load(Ordering::Relaxed)
    }

    /// Add bytes to the accounted total
    #[inline]
    pub fn add_used(&self, bytes: u64) {
        let now = self.size_used.fetch_add(bytes, Ordering::Relaxed) + bytes;
        metrics::set_size_used(now);
    }

    /// Subtract bytes from the accounted total, saturating at zero
    #[inline]
    pub fn sub_used(&self, bytes: u64) {
        let mut now = 0;
        let _ = self
            .size_used
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                now = current.saturating_sub(bytes);
                Some(now)
            });
        metrics::set_size_used(now);
    }

    /// Reset the accounted total to zero
    pub fn reset_used(&self) {
        self.size_used.store(0, Ordering::Relaxed);
        metrics::set_size_used(0);
    }

    /// Record a chunk added to the accounting
    #[inline]
    pub fn inc_chunk_add(&self) {
        self.chunks_added.fetch_add(1, Ordering::Relaxed);
        metrics::inc_chunk_add();
    }

    /// Record a chunk handed to the evict queue
    #[inline]
    pub fn inc_chunk_evict(&self) {
        self.chunks_evicted.fetch_add(1, Ordering::Relaxed);
        metrics::inc_chunk_evict();
    }

    /// Record a metric seen for the first time
    #[inline]
    pub fn inc_metric_add(&self) {
        self.metrics_added.fetch_add(1, Ordering::Relaxed);
        metrics::inc_metric_add();
    }

    /// Record a metric whose last chunk was evicted
    #[inline]
    pub fn inc_metric_evict(&self) {
        self.metrics_evicted.fetch_add(1, Ordering::Relaxed);
        metrics::inc_metric_evict();
    }

    /// Take a consistent-enough snapshot for reporting
    pub fn snapshot(&self) -> AccountingStatsSnapshot {
        AccountingStatsSnapshot {
            size_max: self.size_max.load(Ordering::Relaxed),
            size_used: self.size_used.load(Ordering::Relaxed),
            chunks_added: self.chunks_added.load(Ordering::Relaxed),
            chunks_evicted: self.chunks_evicted.load(Ordering::Relaxed),
            metrics_added: self.metrics_added.load(Ordering::Relaxed),
            metrics_evicted: self.metrics_evicted.load(Ordering::Relaxed),
        }
    }
}
