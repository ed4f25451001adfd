//! Chunk cache accounting and eviction
//!
//! Keeps track of the chunk cache size and the order in which cached chunks
//! were last used. When the accounted total rises above the configured
//! budget, the least recently used chunks are fed into the evict queue,
//! which is consumed by the cache owner's evict loop.
//!
//! # Architecture
//!
//! ```text
//! producers (request-serving tasks)
//!     │  non-blocking try_send, drop-on-full
//!     ▼
//! event queue (bounded MPSC) ──▶ accountant task
//!                                  │ owns ByteLedger + RecencyIndex
//!                                  │ while used > max: evict_one()
//!                                  ▼
//!                               evict queue (bounded) ──▶ cache owner
//! ```
//!
//! All mutation of the ledger and the recency index happens on the single
//! accountant task; neither structure carries a lock. Producers communicate
//! by value and never block: when the event queue is full the event is shed
//! and the accounting tolerates the drift.

pub mod accountant;
pub mod ledger;
pub mod lru;
pub mod stats;

pub use accountant::{Accountant, CacheEvent, EVENT_QUEUE_SIZE, EVICT_QUEUE_SIZE};
pub use ledger::ByteLedger;
pub use lru::RecencyIndex;
pub use stats::{AccountingStats, AccountingStatsSnapshot};

use crate::error::Result;
use async_trait::async_trait;

/// Producer surface of the cache accounting
///
/// The enclosing chunk cache talks to the accountant exclusively through
/// this trait, which lets it be tested against a mock accounting backend.
/// All methods except [`get_total`](Accounting::get_total) are non-blocking
/// and fire-and-forget.
#[async_trait]
pub trait Accounting: Send + Sync {
    /// Record that a chunk of `size` bytes was inserted into the cache
    fn add_chunk(&self, metric: &str, ts: u32, size: u64);

    /// Record a cache hit on a chunk
    fn hit_chunk(&self, metric: &str, ts: u32);

    /// Record that a metric and all of its chunks were dropped
    fn del_metric(&self, metric: &str);

    /// Current accounted byte total; blocks until the accountant replies
    async fn get_total(&self) -> Result<u64>;

    /// Clear all accounting state
    fn reset(&self);

    /// Shut the accountant down
    fn stop(&self);
}
