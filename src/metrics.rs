//! Prometheus metrics for the chunk cache accounting core
//!
//! Process-wide gauges and counters mutated by the accountant task and read
//! by telemetry collectors. Initialized at construction, never torn down.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder,
};

lazy_static! {
    /// Configured cache size budget in bytes
    pub static ref CACHE_SIZE_MAX: IntGauge = register_int_gauge!(
        "cache_size_max",
        "Configured chunk cache size budget in bytes"
    ).unwrap();

    /// Current accounted cache size in bytes
    pub static ref CACHE_SIZE_USED: IntGauge = register_int_gauge!(
        "cache_size_used",
        "Bytes currently accounted to cached chunks"
    ).unwrap();

    /// Chunks added to the accounting
    pub static ref CACHE_CHUNK_ADD: IntCounter = register_int_counter!(
        "cache_chunk_add",
        "Chunks added to the cache accounting"
    ).unwrap();

    /// Chunks handed to the evict queue
    pub static ref CACHE_CHUNK_EVICT: IntCounter = register_int_counter!(
        "cache_chunk_evict",
        "Chunks evicted from the cache accounting"
    ).unwrap();

    /// Metrics seen for the first time
    pub static ref CACHE_METRIC_ADD: IntCounter = register_int_counter!(
        "cache_metric_add",
        "Metrics added to the cache accounting"
    ).unwrap();

    /// Metrics fully drained by eviction
    pub static ref CACHE_METRIC_EVICT: IntCounter = register_int_counter!(
        "cache_metric_evict",
        "Metrics whose last chunk was evicted"
    ).unwrap();
}

/// Get metrics in Prometheus text format
///
/// # Returns
///
/// Result containing the formatted metrics string, or an error if encoding fails
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Set the configured size budget gauge
#[inline]
pub fn set_size_max(bytes: u64) {
    CACHE_SIZE_MAX.set(bytes as i64);
}

/// Set the accounted size gauge
#[inline]
pub fn set_size_used(bytes: u64) {
    CACHE_SIZE_USED.set(bytes as i64);
}

/// Record a chunk added to the accounting
#[inline]
pub fn inc_chunk_add() {
    CACHE_CHUNK_ADD.inc();
}

/// Record a chunk handed to the evict queue
#[inline]
pub fn inc_chunk_evict() {
    CACHE_CHUNK_EVICT.inc();
}

/// Record a metric seen for the first time
#[inline]
pub fn inc_metric_add() {
    CACHE_METRIC_ADD.inc();
}

/// Record a metric fully drained by eviction
#[inline]
pub fn inc_metric_evict() {
    CACHE_METRIC_EVICT.inc();
}
