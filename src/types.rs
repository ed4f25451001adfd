//! Core data types used throughout the accounting core
//!
//! # Key Types
//!
//! - **`MetricKey`**: Name of a time-series metric; owns zero or more chunks
//! - **`ChunkId`**: Unique cache key for a decoded chunk (metric key + chunk timestamp)
//!
//! # Example
//!
//! ```rust
//! use chunk_accounting::types::ChunkId;
//!
//! let id = ChunkId::new("cpu.user", 1_700_000_000);
//! assert_eq!(id.metric, "cpu.user");
//! assert_eq!(id.ts, 1_700_000_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a time-series metric
///
/// Metric keys are opaque strings assigned by the metric index. The accounting
/// core only ever compares and hashes them.
pub type MetricKey = String;

/// Unique identifier for a cached chunk
///
/// A chunk is a fixed time-range block of encoded datapoints for one metric.
/// The pair of metric key and chunk start timestamp (seconds) is unique within
/// the cache at any time. Equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    /// Metric the chunk belongs to
    pub metric: MetricKey,
    /// Chunk start timestamp in seconds
    pub ts: u32,
}

impl ChunkId {
    /// Create a chunk id from a metric key and chunk timestamp
    pub fn new(metric: impl Into<MetricKey>, ts: u32) -> Self {
        Self {
            metric: metric.into(),
            ts,
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.metric, self.ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_chunk_id_equality() {
        let a = ChunkId::new("cpu.user", 100);
        let b = ChunkId::new("cpu.user", 100);
        let c = ChunkId::new("cpu.user", 200);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_chunk_id_as_map_key() {
        let mut map = HashMap::new();
        map.insert(ChunkId::new("mem.free", 60), 1024u64);
        assert_eq!(map.get(&ChunkId::new("mem.free", 60)), Some(&1024));
        assert_eq!(map.get(&ChunkId::new("mem.free", 120)), None);
    }

    #[test]
    fn test_chunk_id_display() {
        let id = ChunkId::new("disk.io", 300);
        assert_eq!(id.to_string(), "disk.io@300");
    }
}
