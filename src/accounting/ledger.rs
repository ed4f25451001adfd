//! Per-metric byte ledger
//!
//! Tracks the size of every cached chunk, grouped by metric, and maintains
//! the authoritative "bytes used" total. All mutation happens on the
//! accountant task; the ledger itself needs no locking.
//!
//! Eviction is batched by chronology: evicting a chunk also evicts every
//! chronologically older chunk of the same metric, regardless of recency.
//! Adjacent chunks of one metric are decoded and freed together by the
//! cache, so leaving older siblings behind wastes memory and fragments the
//! recency distribution.

use crate::accounting::stats::AccountingStats;
use crate::types::{ChunkId, MetricKey};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-metric accounting entry
#[derive(Debug, Default)]
struct MetricEntry {
    /// Sum of sizes of this metric's live chunks
    total: u64,
    /// Chunk timestamp → chunk size in bytes
    chunks: HashMap<u32, u64>,
}

/// Byte accounting over all cached chunks
///
/// Counter updates (`used`, metric add/evict) are pushed into the shared
/// [`AccountingStats`] as a side effect of each mutation, so readers on
/// other threads always see the post-mutation totals.
#[derive(Debug)]
pub struct ByteLedger {
    /// Accounting entries per metric key
    metrics: HashMap<MetricKey, MetricEntry>,
    /// Shared counters, updated alongside every mutation
    stats: Arc<AccountingStats>,
}

impl ByteLedger {
    /// Create an empty ledger writing into the given counters
    pub fn new(stats: Arc<AccountingStats>) -> Self {
        Self {
            metrics: HashMap::new(),
            stats,
        }
    }

    /// Bytes currently accounted across all metrics
    pub fn used(&self) -> u64 {
        self.stats.used()
    }

    /// Number of metrics with at least one accounted chunk
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Whether the ledger holds no chunks at all
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Whether the given chunk is accounted
    pub fn contains_chunk(&self, metric: &str, ts: u32) -> bool {
        self.metrics
            .get(metric)
            .map(|met| met.chunks.contains_key(&ts))
            .unwrap_or(false)
    }

    /// Accounted byte total for one metric, or `None` if unknown
    pub fn metric_total(&self, metric: &str) -> Option<u64> {
        self.metrics.get(metric).map(|met| met.total)
    }

    /// Account a chunk of `size` bytes under `(metric, ts)`
    ///
    /// Creates the metric entry on demand. A second add for an existing
    /// `(metric, ts)` pair is a no-op. Returns whether the chunk was newly
    /// accounted.
    pub fn add(&mut self, metric: &str, ts: u32, size: u64) -> bool {
        if !self.metrics.contains_key(metric) {
            self.stats.inc_metric_add();
            self.metrics
                .insert(metric.to_string(), MetricEntry::default());
        }
        let Some(met) = self.metrics.get_mut(metric) else {
            return false;
        };

        if met.chunks.contains_key(&ts) {
            // we already have that chunk
            return false;
        }

        met.chunks.insert(ts, size);
        met.total += size;
        self.stats.add_used(size);
        true
    }

    /// Drop a metric and all of its chunks
    ///
    /// Returns the timestamps that were accounted under the metric so the
    /// caller can prune the recency index. Empty if the metric was unknown.
    pub fn del_metric(&mut self, metric: &str) -> Vec<u32> {
        let Some(met) = self.metrics.remove(metric) else {
            return Vec::new();
        };

        self.stats.sub_used(met.total);
        met.chunks.into_keys().collect()
    }

    /// Evict `target` and every chronologically older chunk of its metric
    ///
    /// Collects every chunk of `target.metric` with `ts <= target.ts`,
    /// removes them from the accounting and returns them in ascending-ts
    /// order. If the metric's total reaches zero its entry is removed.
    /// Returns empty if the metric is unknown (the recency index can hold
    /// ids the ledger never saw; callers treat that as "nothing to do").
    pub fn evict_from(&mut self, target: &ChunkId) -> Vec<ChunkId> {
        let Some(met) = self.metrics.get_mut(&target.metric) else {
            return Vec::new();
        };

        let mut targets: Vec<u32> = met
            .chunks
            .keys()
            .copied()
            .filter(|&ts| ts <= target.ts)
            .collect();
        targets.sort_unstable();

        let mut victims = Vec::with_capacity(targets.len());
        for ts in targets {
            if let Some(size) = met.chunks.remove(&ts) {
                met.total = met.total.saturating_sub(size);
                self.stats.sub_used(size);
                victims.push(ChunkId::new(target.metric.clone(), ts));
            }
        }

        if met.total == 0 {
            self.metrics.remove(&target.metric);
            self.stats.inc_metric_evict();
        }

        victims
    }

    /// Drop all accounting state and zero the byte total
    pub fn reset(&mut self) {
        self.metrics.clear();
        self.stats.reset_used();
    }
}
