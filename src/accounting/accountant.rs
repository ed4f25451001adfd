//! The accountant: a serialized processor of cache events
//!
//! [`Accountant`] is the public façade. It owns the bounded event queue,
//! spawns the single consumer task, and exposes non-blocking producer
//! methods. The task applies each event to the byte ledger and the recency
//! index, then drains any excess over the byte budget into the evict queue.
//!
//! # Availability trade-off
//!
//! Enqueueing an event never blocks a request-serving thread: when the
//! event queue is full the event is logged at error level and dropped. The
//! resulting drift between the real cache and the ledger is transient and
//! self-heals on later events. The evict queue is the opposite: the
//! accountant blocks when it is full, since discarding an eviction decision
//! would either leak chunk memory or double-count it.
//!
//! # Example
//!
//! ```rust,ignore
//! use chunk_accounting::Accountant;
//!
//! let accnt = Accountant::new(512 * 1024 * 1024);
//! let mut evictions = accnt.take_evict_queue().unwrap();
//!
//! accnt.add_chunk("cpu.user", 1000, 4096);
//! accnt.hit_chunk("cpu.user", 1000);
//!
//! // cache owner's evict loop
//! while let Some(id) = evictions.recv().await {
//!     // free the chunk bytes for `id`
//! }
//! ```

use crate::accounting::ledger::ByteLedger;
use crate::accounting::lru::RecencyIndex;
use crate::accounting::stats::{AccountingStats, AccountingStatsSnapshot};
use crate::accounting::Accounting;
use crate::config::AccountingConfig;
use crate::error::{AccountingError, Error, Result};
use crate::types::{ChunkId, MetricKey};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

/// Event queue capacity.
///
/// Many events can happen in one request; this must be large enough that
/// the queue practically never fills, because a full queue means dropped
/// events.
pub const EVENT_QUEUE_SIZE: usize = 100_000;

/// Evict queue capacity.
pub const EVICT_QUEUE_SIZE: usize = 1_000;

/// Events feeding the accountant task
#[derive(Debug)]
pub enum CacheEvent {
    /// A chunk was inserted into the underlying cache
    AddChunk {
        /// Metric the chunk belongs to
        metric: MetricKey,
        /// Chunk start timestamp in seconds
        ts: u32,
        /// Chunk size in bytes
        size: u64,
    },
    /// A cache hit was observed on a chunk
    HitChunk {
        /// Metric the chunk belongs to
        metric: MetricKey,
        /// Chunk start timestamp in seconds
        ts: u32,
    },
    /// A metric was dropped, e.g. pruned from the metric index
    DelMetric {
        /// The dropped metric
        metric: MetricKey,
    },
    /// Request for the current accounted byte total
    GetTotal {
        /// One-shot reply channel
        reply: oneshot::Sender<u64>,
    },
    /// Clear all accounting state
    Reset,
    /// Shut the accountant loop down
    Stop,
}

/// Chunk cache accountant
///
/// Tracks per-metric byte usage and chunk recency, and feeds eviction
/// decisions to the cache owner once the configured byte budget is
/// exceeded. All producer methods are non-blocking; see the module docs
/// for the overload behavior.
pub struct Accountant {
    /// Producer side of the event queue
    event_tx: mpsc::Sender<CacheEvent>,
    /// Evict queue receiver, handed out once to the cache owner
    evict_rx: Mutex<Option<mpsc::Receiver<ChunkId>>>,
    /// Shared counters, written by the accountant task
    stats: Arc<AccountingStats>,
}

impl Accountant {
    /// Create an accountant with the given byte budget and spawn its task
    ///
    /// A `max_bytes` of zero disables the budget: the accounting still
    /// tracks sizes and recency but never evicts.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(max_bytes: u64) -> Self {
        Self::with_queue_sizes(max_bytes, EVENT_QUEUE_SIZE, EVICT_QUEUE_SIZE)
    }

    /// Create an accountant from a validated configuration
    pub fn from_config(config: &AccountingConfig) -> Self {
        Self::new(config.cache.max_bytes)
    }

    fn with_queue_sizes(max_bytes: u64, event_capacity: usize, evict_capacity: usize) -> Self {
        let (event_tx, event_rx) = mpsc::channel(event_capacity);
        let (evict_tx, evict_rx) = mpsc::channel(evict_capacity);

        let stats = Arc::new(AccountingStats::new());
        stats.set_max(max_bytes);

        let core = AccountantCore {
            max_bytes,
            ledger: ByteLedger::new(Arc::clone(&stats)),
            recency: RecencyIndex::new(),
            stats: Arc::clone(&stats),
            evict_tx,
        };
        tokio::spawn(core.run(event_rx));

        Self {
            event_tx,
            evict_rx: Mutex::new(Some(evict_rx)),
            stats,
        }
    }

    /// Record that a chunk of `size` bytes was inserted into the cache
    ///
    /// Non-blocking; the event is dropped if the event queue is full.
    pub fn add_chunk(&self, metric: &str, ts: u32, size: u64) {
        self.submit(CacheEvent::AddChunk {
            metric: metric.to_owned(),
            ts,
            size,
        });
    }

    /// Record a cache hit on a chunk
    ///
    /// Non-blocking; the event is dropped if the event queue is full.
    pub fn hit_chunk(&self, metric: &str, ts: u32) {
        self.submit(CacheEvent::HitChunk {
            metric: metric.to_owned(),
            ts,
        });
    }

    /// Record that a metric and all of its chunks were dropped
    ///
    /// The producer is expected to have released the chunk memory already;
    /// no evict-queue entries are emitted for the removed chunks.
    pub fn del_metric(&self, metric: &str) {
        self.submit(CacheEvent::DelMetric {
            metric: metric.to_owned(),
        });
    }

    /// Current accounted byte total, as seen by the accountant
    ///
    /// Blocks until every event submitted before this call has been
    /// applied, which makes it double as a quiescence barrier. Returns an
    /// error if the event was shed on overflow or the accountant has
    /// stopped. Callers that need a timeout wrap this externally.
    pub async fn get_total(&self) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        match self.event_tx.try_send(CacheEvent::GetTotal { reply }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                error!("event queue full, dropping accounting event");
                return Err(Error::from(AccountingError::EventQueueFull));
            }
            Err(TrySendError::Closed(_)) => {
                return Err(Error::from(AccountingError::Stopped));
            }
        }
        rx.await.map_err(|_| Error::from(AccountingError::Stopped))
    }

    /// Clear all accounting state and zero the byte total
    pub fn reset(&self) {
        self.submit(CacheEvent::Reset);
    }

    /// Shut the accountant loop down
    ///
    /// Enqueues the stop event and returns. Events already queued behind it
    /// are discarded when the loop exits; producers must quiesce first for
    /// deterministic shutdown. The evict queue still yields buffered
    /// entries, so the cache owner drains it on its own shutdown path.
    pub fn stop(&self) {
        self.submit(CacheEvent::Stop);
    }

    /// Take the evict queue receiver
    ///
    /// The accountant is the sole producer and the cache owner the sole
    /// consumer; the receiver can therefore be taken exactly once. Returns
    /// `None` on every call after the first.
    pub fn take_evict_queue(&self) -> Option<mpsc::Receiver<ChunkId>> {
        self.evict_rx.lock().take()
    }

    /// Cheap read of the accounted byte total
    ///
    /// Reads the shared counter without going through the event queue, so
    /// it may lag `get_total` by the events still in flight.
    pub fn used(&self) -> u64 {
        self.stats.used()
    }

    /// Snapshot of the accounting counters
    pub fn stats(&self) -> AccountingStatsSnapshot {
        self.stats.snapshot()
    }

    fn submit(&self, event: CacheEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                // we never want to block for accounting, rather miss some
                // events and surface an error
                error!("event queue full, dropping accounting event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("accountant stopped, dropping accounting event");
            }
        }
    }
}

#[async_trait]
impl Accounting for Accountant {
    fn add_chunk(&self, metric: &str, ts: u32, size: u64) {
        Accountant::add_chunk(self, metric, ts, size);
    }

    fn hit_chunk(&self, metric: &str, ts: u32) {
        Accountant::hit_chunk(self, metric, ts);
    }

    fn del_metric(&self, metric: &str) {
        Accountant::del_metric(self, metric);
    }

    async fn get_total(&self) -> Result<u64> {
        Accountant::get_total(self).await
    }

    fn reset(&self) {
        Accountant::reset(self);
    }

    fn stop(&self) {
        Accountant::stop(self);
    }
}

/// State owned by the accountant task
struct AccountantCore {
    /// Byte budget; zero disables eviction
    max_bytes: u64,
    /// Per-metric byte accounting
    ledger: ByteLedger,
    /// LRU index over cached chunks
    recency: RecencyIndex,
    /// Shared counters
    stats: Arc<AccountingStats>,
    /// Producer side of the evict queue
    evict_tx: mpsc::Sender<ChunkId>,
}

impl AccountantCore {
    /// Consume events until a stop event arrives or all producers are gone
    async fn run(mut self, mut events: mpsc::Receiver<CacheEvent>) {
        info!(max_bytes = self.max_bytes, "cache accountant started");
        while let Some(event) = events.recv().await {
            if !self.apply(event) {
                break;
            }
            self.drain_excess().await;
        }
        info!("cache accountant stopped");
    }

    /// Apply one event; returns false when the loop should exit
    fn apply(&mut self, event: CacheEvent) -> bool {
        match event {
            CacheEvent::AddChunk { metric, ts, size } => {
                if self.ledger.add(&metric, ts, size) {
                    self.stats.inc_chunk_add();
                }
                self.recency.touch(ChunkId::new(metric, ts));
            }
            CacheEvent::HitChunk { metric, ts } => {
                // a hit may race a delete, so this can insert an id the
                // ledger does not know; evict_one resolves those lazily
                self.recency.touch(ChunkId::new(metric, ts));
            }
            CacheEvent::DelMetric { metric } => {
                for ts in self.ledger.del_metric(&metric) {
                    self.recency.del(&ChunkId::new(metric.clone(), ts));
                }
            }
            CacheEvent::GetTotal { reply } => {
                let _ = reply.send(self.stats.used());
            }
            CacheEvent::Reset => {
                self.ledger.reset();
                self.recency.reset();
            }
            CacheEvent::Stop => return false,
        }
        true
    }

    /// Evict until the accounted total is back under the budget
    async fn drain_excess(&mut self) {
        while self.max_bytes > 0 && self.stats.used() > self.max_bytes {
            if !self.evict_one().await {
                return;
            }
        }
    }

    /// Pop the least recently used chunk and evict it together with every
    /// chronologically older chunk of the same metric
    ///
    /// Returns false only when the recency index is empty; a popped id the
    /// ledger no longer knows still counts as progress, which keeps the
    /// drain loop terminating even if ledger and recency diverge.
    async fn evict_one(&mut self) -> bool {
        let Some(target) = self.recency.pop() else {
            return false;
        };

        let victims = self.ledger.evict_from(&target);
        if victims.is_empty() {
            trace!(chunk = %target, "popped recency entry without ledger backing");
            return true;
        }

        for victim in victims {
            // the target itself was already popped; its chronological
            // siblings still hold recency entries
            if victim != target {
                self.recency.del(&victim);
            }
            self.stats.inc_chunk_evict();
            trace!(chunk = %victim, "chunk eviction queued");
            if self.evict_tx.send(victim).await.is_err() {
                warn!("evict queue receiver dropped, discarding eviction notice");
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    /// Wait until all previously submitted events have been applied.
    async fn quiesce(accnt: &Accountant) -> u64 {
        accnt.get_total().await.expect("accountant alive")
    }

    fn drain_ready(rx: &mut mpsc::Receiver<ChunkId>) -> Vec<ChunkId> {
        let mut out = Vec::new();
        while let Ok(id) = rx.try_recv() {
            out.push(id);
        }
        out
    }

    #[tokio::test]
    async fn test_basic_fill_and_evict() {
        let accnt = Accountant::new(30);
        let mut evict_rx = accnt.take_evict_queue().expect("first take");

        accnt.add_chunk("a", 1, 10);
        accnt.add_chunk("a", 2, 10);
        accnt.add_chunk("a", 3, 10);
        accnt.add_chunk("a", 4, 10);

        assert_eq!(quiesce(&accnt).await, 30);
        assert_eq!(drain_ready(&mut evict_rx), vec![ChunkId::new("a", 1)]);

        let snap = accnt.stats();
        assert_eq!(snap.chunks_added, 4);
        assert_eq!(snap.chunks_evicted, 1);
        assert_eq!(snap.metrics_added, 1);
        assert_eq!(snap.metrics_evicted, 0);
    }

    #[tokio::test]
    async fn test_batched_eviction_by_chronology() {
        let accnt = Accountant::new(40);
        let mut evict_rx = accnt.take_evict_queue().expect("first take");

        accnt.add_chunk("a", 1, 10);
        accnt.add_chunk("a", 2, 10);
        accnt.add_chunk("a", 3, 10);
        accnt.add_chunk("a", 4, 10);
        // refreshing the oldest chunk makes a@2 the LRU candidate, so the
        // eviction batch must sweep up a@1 as its chronological sibling
        accnt.hit_chunk("a", 1);
        accnt.add_chunk("a", 5, 10);

        assert_eq!(quiesce(&accnt).await, 30);
        assert_eq!(
            drain_ready(&mut evict_rx),
            vec![ChunkId::new("a", 1), ChunkId::new("a", 2)]
        );
    }

    #[tokio::test]
    async fn test_cross_metric_lru_order() {
        let accnt = Accountant::new(20);
        let mut evict_rx = accnt.take_evict_queue().expect("first take");

        accnt.add_chunk("a", 1, 10);
        accnt.add_chunk("b", 1, 10);
        accnt.hit_chunk("a", 1);
        accnt.add_chunk("c", 1, 10);

        assert_eq!(quiesce(&accnt).await, 20);
        assert_eq!(drain_ready(&mut evict_rx), vec![ChunkId::new("b", 1)]);

        let snap = accnt.stats();
        assert_eq!(snap.metrics_evicted, 1);
    }

    #[tokio::test]
    async fn test_del_metric_emits_no_evictions() {
        let accnt = Accountant::new(100);
        let mut evict_rx = accnt.take_evict_queue().expect("first take");

        accnt.add_chunk("a", 1, 10);
        accnt.add_chunk("a", 2, 10);
        accnt.del_metric("a");

        assert_eq!(quiesce(&accnt).await, 0);
        assert!(drain_ready(&mut evict_rx).is_empty());

        // the recency entries are gone too: filling up again must evict
        // fresh chunks, not the deleted ones
        accnt.add_chunk("b", 1, 60);
        accnt.add_chunk("b", 2, 60);
        assert_eq!(quiesce(&accnt).await, 60);
        assert_eq!(drain_ready(&mut evict_rx), vec![ChunkId::new("b", 1)]);
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let accnt = Accountant::new(100);
        let mut evict_rx = accnt.take_evict_queue().expect("first take");

        accnt.add_chunk("a", 1, 10);
        accnt.add_chunk("b", 1, 20);
        assert_eq!(quiesce(&accnt).await, 30);

        accnt.reset();
        assert_eq!(quiesce(&accnt).await, 0);

        // behaves as fresh state afterwards
        accnt.add_chunk("a", 1, 5);
        assert_eq!(quiesce(&accnt).await, 5);
        assert!(drain_ready(&mut evict_rx).is_empty());
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let accnt = Accountant::new(100);

        accnt.add_chunk("a", 1, 10);
        accnt.add_chunk("a", 1, 10);
        accnt.add_chunk("a", 1, 25);

        assert_eq!(quiesce(&accnt).await, 10);
        assert_eq!(accnt.stats().chunks_added, 1);
    }

    #[tokio::test]
    async fn test_hit_on_unknown_chunk_self_heals() {
        let accnt = Accountant::new(20);
        let mut evict_rx = accnt.take_evict_queue().expect("first take");

        // recency-only entry the ledger never sees
        accnt.hit_chunk("ghost", 5);
        accnt.add_chunk("a", 1, 10);
        accnt.add_chunk("a", 2, 10);
        accnt.add_chunk("a", 3, 10);

        // the ghost pop wastes one drain iteration, then a@1 goes
        assert_eq!(quiesce(&accnt).await, 20);
        assert_eq!(drain_ready(&mut evict_rx), vec![ChunkId::new("a", 1)]);
    }

    #[tokio::test]
    async fn test_zero_budget_disables_eviction() {
        let accnt = Accountant::new(0);
        let mut evict_rx = accnt.take_evict_queue().expect("first take");

        for ts in 0..50 {
            accnt.add_chunk("a", ts, 1_000_000);
        }

        assert_eq!(quiesce(&accnt).await, 50_000_000);
        assert!(drain_ready(&mut evict_rx).is_empty());
    }

    #[tokio::test]
    async fn test_stop_then_get_total_errors() {
        let accnt = Accountant::new(100);
        accnt.add_chunk("a", 1, 10);
        accnt.stop();

        assert!(accnt.get_total().await.is_err());
        // producers that keep going observe silent drops, not panics
        accnt.add_chunk("a", 2, 10);
        accnt.hit_chunk("a", 1);
    }

    #[tokio::test]
    async fn test_take_evict_queue_is_single_take() {
        let accnt = Accountant::new(100);
        assert!(accnt.take_evict_queue().is_some());
        assert!(accnt.take_evict_queue().is_none());
    }

    #[tokio::test]
    async fn test_used_tracks_total() {
        let accnt = Accountant::new(1000);
        accnt.add_chunk("a", 1, 123);
        let total = quiesce(&accnt).await;
        assert_eq!(total, 123);
        assert_eq!(accnt.used(), 123);
    }

    #[tokio::test]
    async fn test_from_config() {
        let mut config = AccountingConfig::default();
        config.cache.max_bytes = 64;
        let accnt = Accountant::from_config(&config);

        accnt.add_chunk("a", 1, 10);
        assert_eq!(quiesce(&accnt).await, 10);
        assert_eq!(accnt.stats().size_max, 64);
    }

    #[tokio::test]
    async fn test_event_queue_overflow_drops_events() {
        // evict queue of one slot and no consumer: the second eviction push
        // blocks the accountant, letting the event queue fill up
        let accnt = Accountant::with_queue_sizes(10, 2, 1);
        let mut evict_rx = accnt.take_evict_queue().expect("first take");

        accnt.add_chunk("a", 1, 10);
        accnt.add_chunk("a", 2, 10); // evicts a@1, fills the evict queue
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        accnt.add_chunk("a", 3, 10); // evicts a@2, blocks on the full queue
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        // the loop is parked on the evict send; these two sit in the queue
        accnt.add_chunk("a", 4, 10);
        accnt.add_chunk("a", 5, 10);
        // and these two are shed
        accnt.add_chunk("a", 6, 10);
        accnt.add_chunk("a", 7, 10);

        // unblock the accountant and let it catch up
        assert_eq!(evict_rx.recv().await, Some(ChunkId::new("a", 1)));
        assert_eq!(evict_rx.recv().await, Some(ChunkId::new("a", 2)));
        assert_eq!(evict_rx.recv().await, Some(ChunkId::new("a", 3)));
        assert_eq!(evict_rx.recv().await, Some(ChunkId::new("a", 4)));

        assert_eq!(quiesce(&accnt).await, 10);
        // state reflects only the accepted events
        assert_eq!(accnt.stats().chunks_added, 5);
        assert_eq!(evict_rx.try_recv(), Err(TryRecvError::Empty));
    }
}
