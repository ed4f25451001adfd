//! Recency index over cached chunks
//!
//! An exact-order LRU set of [`ChunkId`]s with O(1) touch, delete and
//! pop-oldest. Uses a `HashMap` for id→index lookup and an arena-based
//! doubly-linked list for recency ordering; no unsafe code, index-based
//! links instead of raw pointers, and removed slots are recycled through a
//! free list so steady-state churn allocates nothing.
//!
//! The index stores ids only. Sizes live in the byte ledger; the accountant
//! keeps the two in step.

use crate::types::ChunkId;
use std::collections::HashMap;

/// Sentinel value for null links in the doubly-linked list.
const NIL: usize = usize::MAX;

/// A node in the arena-based doubly-linked list.
/// `id` is `None` while the slot sits on the free list.
#[derive(Debug)]
struct Node {
    id: Option<ChunkId>,
    prev: usize,
    next: usize,
}

/// Exact-order LRU index over chunk ids
///
/// Head of the list is the most-recently used id, tail the least-recently
/// used. A chunk id appears at most once.
#[derive(Debug, Default)]
pub struct RecencyIndex {
    /// ChunkId → arena index mapping
    map: HashMap<ChunkId, usize>,
    /// Arena of list nodes
    arena: Vec<Node>,
    /// Most-recently used node
    head: usize,
    /// Least-recently used node
    tail: usize,
    /// Free-list head for recycling removed slots
    free_head: usize,
}

impl RecencyIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            arena: Vec::new(),
            head: NIL,
            tail: NIL,
            free_head: NIL,
        }
    }

    /// Number of tracked chunk ids
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Whether the index tracks the given id (no recency change)
    pub fn contains(&self, id: &ChunkId) -> bool {
        self.map.contains_key(id)
    }

    /// Mark `id` as most-recently used, inserting it if absent
    pub fn touch(&mut self, id: ChunkId) {
        if let Some(&idx) = self.map.get(&id) {
            self.move_to_head(idx);
        } else {
            let idx = self.alloc_slot(id.clone());
            self.push_head(idx);
            self.map.insert(id, idx);
        }
    }

    /// Remove `id` from the index; no-op if absent
    pub fn del(&mut self, id: &ChunkId) {
        if let Some(idx) = self.map.remove(id) {
            self.unlink(idx);
            self.arena[idx].id = None;
            self.free_slot(idx);
        }
    }

    /// Remove and return the least-recently used id, or `None` if empty
    pub fn pop(&mut self) -> Option<ChunkId> {
        if self.tail == NIL {
            return None;
        }
        let idx = self.tail;
        self.unlink(idx);
        let id = self.arena[idx].id.take()?;
        self.map.remove(&id);
        self.free_slot(idx);
        Some(id)
    }

    /// Discard all entries
    pub fn reset(&mut self) {
        self.map.clear();
        self.arena.clear();
        self.head = NIL;
        self.tail = NIL;
        self.free_head = NIL;
    }

    // --- Internal linked-list operations ---

    /// Allocate a slot in the arena, reusing a free slot if available.
    fn alloc_slot(&mut self, id: ChunkId) -> usize {
        if self.free_head != NIL {
            let idx = self.free_head;
            self.free_head = self.arena[idx].next;
            self.arena[idx] = Node {
                id: Some(id),
                prev: NIL,
                next: NIL,
            };
            idx
        } else {
            let idx = self.arena.len();
            self.arena.push(Node {
                id: Some(id),
                prev: NIL,
                next: NIL,
            });
            idx
        }
    }

    /// Put a slot back on the free list. The slot must already be unlinked.
    fn free_slot(&mut self, idx: usize) {
        self.arena[idx].next = self.free_head;
        self.free_head = idx;
    }

    /// Remove node at `idx` from the doubly-linked list (does NOT free the slot).
    fn unlink(&mut self, idx: usize) {
        let prev = self.arena[idx].prev;
        let next = self.arena[idx].next;

        if prev != NIL {
            self.arena[prev].next = next;
        } else {
            self.head = next;
        }

        if next != NIL {
            self.arena[next].prev = prev;
        } else {
            self.tail = prev;
        }

        self.arena[idx].prev = NIL;
        self.arena[idx].next = NIL;
    }

    /// Push node at `idx` to the head of the list (most-recently used).
    fn push_head(&mut self, idx: usize) {
        self.arena[idx].prev = NIL;
        self.arena[idx].next = self.head;

        if self.head != NIL {
            self.arena[self.head].prev = idx;
        }
        self.head = idx;

        if self.tail == NIL {
            self.tail = idx;
        }
    }

    /// Move an existing node to the head (most-recently used).
    fn move_to_head(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        self.push_head(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(metric: &str, ts: u32) -> ChunkId {
        ChunkId::new(metric, ts)
    }

    #[test]
    fn test_empty_pop() {
        let mut lru = RecencyIndex::new();
        assert!(lru.is_empty());
        assert_eq!(lru.pop(), None);
    }

    #[test]
    fn test_pop_in_insertion_order() {
        let mut lru = RecencyIndex::new();
        lru.touch(id("a", 1));
        lru.touch(id("a", 2));
        lru.touch(id("b", 1));

        assert_eq!(lru.pop(), Some(id("a", 1)));
        assert_eq!(lru.pop(), Some(id("a", 2)));
        assert_eq!(lru.pop(), Some(id("b", 1)));
        assert_eq!(lru.pop(), None);
    }

    #[test]
    fn test_touch_moves_to_mru() {
        let mut lru = RecencyIndex::new();
        lru.touch(id("a", 1));
        lru.touch(id("a", 2));
        lru.touch(id("a", 3));

        // a@1 was oldest; touching it makes a@2 the eviction candidate
        lru.touch(id("a", 1));

        assert_eq!(lru.pop(), Some(id("a", 2)));
        assert_eq!(lru.pop(), Some(id("a", 3)));
        assert_eq!(lru.pop(), Some(id("a", 1)));
    }

    #[test]
    fn test_touch_is_idempotent_on_membership() {
        let mut lru = RecencyIndex::new();
        lru.touch(id("a", 1));
        lru.touch(id("a", 1));
        lru.touch(id("a", 1));
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_del_middle_head_tail() {
        let mut lru = RecencyIndex::new();
        lru.touch(id("a", 1));
        lru.touch(id("a", 2));
        lru.touch(id("a", 3));

        lru.del(&id("a", 2)); // middle
        assert_eq!(lru.len(), 2);
        lru.del(&id("a", 3)); // head (MRU)
        lru.del(&id("a", 1)); // tail (LRU)
        assert!(lru.is_empty());
        assert_eq!(lru.pop(), None);
    }

    #[test]
    fn test_del_absent_is_noop() {
        let mut lru = RecencyIndex::new();
        lru.touch(id("a", 1));
        lru.del(&id("b", 9));
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn test_reset() {
        let mut lru = RecencyIndex::new();
        lru.touch(id("a", 1));
        lru.touch(id("b", 1));
        lru.reset();
        assert!(lru.is_empty());
        assert_eq!(lru.pop(), None);

        // usable after reset
        lru.touch(id("c", 1));
        assert_eq!(lru.pop(), Some(id("c", 1)));
    }

    #[test]
    fn test_slot_reuse_bounds_arena() {
        let mut lru = RecencyIndex::new();
        for round in 0..100 {
            lru.touch(id("a", round));
            lru.touch(id("b", round));
            assert_eq!(lru.pop(), Some(id("a", round)));
            assert_eq!(lru.pop(), Some(id("b", round)));
        }
        assert!(lru.is_empty());
        assert!(lru.arena.len() <= 2);
    }

    #[test]
    fn test_contains_does_not_promote() {
        let mut lru = RecencyIndex::new();
        lru.touch(id("a", 1));
        lru.touch(id("a", 2));
        assert!(lru.contains(&id("a", 1)));
        assert_eq!(lru.pop(), Some(id("a", 1)));
    }

    #[test]
    fn test_interleaved_touch_del_pop() {
        let mut lru = RecencyIndex::new();
        lru.touch(id("a", 1));
        lru.touch(id("b", 1));
        lru.touch(id("c", 1));
        lru.del(&id("b", 1));
        lru.touch(id("a", 1)); // order now: c, a
        lru.touch(id("d", 1)); // order now: c, a, d

        assert_eq!(lru.pop(), Some(id("c", 1)));
        assert_eq!(lru.pop(), Some(id("a", 1)));
        assert_eq!(lru.pop(), Some(id("d", 1)));
    }
}
