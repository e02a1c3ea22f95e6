//! Ordered index: key map + intrusive recency list
//!
//! The single structure behind the cache engine. A `HashMap` maps keys to
//! arena slots; the slots form a doubly linked list in exact recency order
//! (head = most recent, tail = next to evict). Links are slot indices into
//! the arena rather than references, with a per-slot generation counter, so
//! touch, eviction, and handle-directed removal are all O(1) and a stale
//! handle against a recycled slot degrades to a no-op.
//!
//! Invariants owned here:
//! 1. `len() <= capacity()` is the caller's to restore after insert (the
//!    index never evicts on its own).
//! 2. A key is in the map iff its entry is linked in the list, exactly once.
//! 3. List order is exact recency order.
//! 4. A vacated slot holds no entry and its generation no longer matches
//!    any outstanding handle.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::entry::{EntryInner, Slot};

/// Sentinel for null links
const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node<K, V> {
    entry: Option<Arc<EntryInner<K, V>>>,
    generation: u64,
    prev: usize,
    next: usize,
}

#[derive(Debug)]
pub(crate) struct OrderedIndex<K, V> {
    capacity: usize,
    map: HashMap<K, usize>,
    arena: Vec<Node<K, V>>,
    /// Most-recent end
    head: usize,
    /// Least-recent end
    tail: usize,
    /// Free-list of vacated slots, chained through `next`
    free_head: usize,
}

impl<K: Hash + Eq + Clone, V> OrderedIndex<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::with_capacity(capacity),
            arena: Vec::with_capacity(capacity),
            head: NIL,
            tail: NIL,
            free_head: NIL,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    /// Find the live entry for `key` without changing recency order
    pub(crate) fn lookup(&self, key: &K) -> Option<(usize, Arc<EntryInner<K, V>>)> {
        let idx = *self.map.get(key)?;
        let entry = self.arena[idx].entry.as_ref()?;
        Some((idx, Arc::clone(entry)))
    }

    /// Whether a slot still holds the entry the handle was issued for
    pub(crate) fn is_live(&self, slot: Slot) -> bool {
        slot.index < self.arena.len()
            && self.arena[slot.index].generation == slot.generation
            && self.arena[slot.index].entry.is_some()
    }

    /// Insert a new entry at the most-recent end
    ///
    /// The key must not be present; the engine checks before calling.
    pub(crate) fn insert_most_recent(&mut self, key: K, value: V) -> Arc<EntryInner<K, V>> {
        debug_assert!(!self.map.contains_key(&key));

        let idx = self.alloc();
        let generation = self.arena[idx].generation;
        let entry = Arc::new(EntryInner {
            key: key.clone(),
            value,
            slot: Some(Slot {
                index: idx,
                generation,
            }),
        });
        self.arena[idx].entry = Some(Arc::clone(&entry));
        self.push_head(idx);
        self.map.insert(key, idx);
        entry
    }

    /// Relink an existing entry at the most-recent end
    pub(crate) fn touch(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        self.push_head(idx);
    }

    /// Remove and return the least-recent entry; `None` on empty
    pub(crate) fn evict_least_recent(&mut self) -> Option<Arc<EntryInner<K, V>>> {
        if self.tail == NIL {
            return None;
        }
        let idx = self.tail;
        self.unlink(idx);
        self.vacate(idx)
    }

    /// Remove the entry a handle points at, wherever it currently sits
    ///
    /// Generation-checked: a slot that was since vacated or recycled is
    /// left untouched, which makes handle removal idempotent.
    pub(crate) fn remove_slot(&mut self, slot: Slot) -> Option<Arc<EntryInner<K, V>>> {
        if !self.is_live(slot) {
            return None;
        }
        self.unlink(slot.index);
        self.vacate(slot.index)
    }

    /// Remove every entry whose key matches, preserving survivor order
    pub(crate) fn remove_all_matching<F>(&mut self, mut filter: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let mut doomed = Vec::new();
        let mut idx = self.head;
        while idx != NIL {
            let node = &self.arena[idx];
            if let Some(entry) = &node.entry {
                if filter(&entry.key) {
                    doomed.push(idx);
                }
            }
            idx = node.next;
        }

        let count = doomed.len();
        for idx in doomed {
            self.unlink(idx);
            self.vacate(idx);
        }
        count
    }

    /// Drop every entry
    ///
    /// Slots are kept and their generations bumped, so handles issued
    /// before the clear stay dead even once slots are reused.
    pub(crate) fn clear(&mut self) {
        self.map.clear();
        self.head = NIL;
        self.tail = NIL;
        self.free_head = NIL;
        for idx in (0..self.arena.len()).rev() {
            let node = &mut self.arena[idx];
            if node.entry.take().is_some() {
                node.generation += 1;
            }
            node.prev = NIL;
            node.next = self.free_head;
            self.free_head = idx;
        }
    }

    /// Keys in recency order, most recent first
    pub(crate) fn keys_most_recent_first(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.map.len());
        let mut idx = self.head;
        while idx != NIL {
            let node = &self.arena[idx];
            if let Some(entry) = &node.entry {
                keys.push(entry.key.clone());
            }
            idx = node.next;
        }
        keys
    }

    // ------------------------------------------------------------------
    // Slot and link management
    // ------------------------------------------------------------------

    /// Allocate a slot, reusing a vacated one when available
    fn alloc(&mut self) -> usize {
        if self.free_head != NIL {
            let idx = self.free_head;
            self.free_head = self.arena[idx].next;
            self.arena[idx].prev = NIL;
            self.arena[idx].next = NIL;
            idx
        } else {
            let idx = self.arena.len();
            self.arena.push(Node {
                entry: None,
                generation: 1,
                prev: NIL,
                next: NIL,
            });
            idx
        }
    }

    /// Detach a slot from the recency list without freeing it
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

    /// Link an unlinked slot at the most-recent end
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

    /// Empty an unlinked slot: drop the map binding, bump the generation,
    /// push onto the free list
    fn vacate(&mut self, idx: usize) -> Option<Arc<EntryInner<K, V>>> {
        let entry = self.arena[idx].entry.take()?;
        self.map.remove(&entry.key);
        self.arena[idx].generation += 1;
        self.arena[idx].prev = NIL;
        self.arena[idx].next = self.free_head;
        self.free_head = idx;
        Some(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(index: &OrderedIndex<i32, i32>) -> Vec<i32> {
        index.keys_most_recent_first()
    }

    #[test]
    fn test_insert_order_most_recent_first() {
        let mut index = OrderedIndex::new(5);
        index.insert_most_recent(1, 10);
        index.insert_most_recent(2, 20);
        index.insert_most_recent(3, 30);

        assert_eq!(index.len(), 3);
        assert_eq!(keys(&index), vec![3, 2, 1]);
    }

    #[test]
    fn test_lookup_does_not_reorder() {
        let mut index = OrderedIndex::new(3);
        index.insert_most_recent(1, 10);
        index.insert_most_recent(2, 20);

        let (_, entry) = index.lookup(&1).unwrap();
        assert_eq!(entry.value, 10);
        assert_eq!(keys(&index), vec![2, 1]);
        assert!(index.lookup(&9).is_none());
    }

    #[test]
    fn test_touch_moves_to_most_recent() {
        let mut index = OrderedIndex::new(3);
        index.insert_most_recent(1, 10);
        index.insert_most_recent(2, 20);
        index.insert_most_recent(3, 30);

        let (idx, _) = index.lookup(&1).unwrap();
        index.touch(idx);
        assert_eq!(keys(&index), vec![1, 3, 2]);

        // Touching the head is a no-op
        let (idx, _) = index.lookup(&1).unwrap();
        index.touch(idx);
        assert_eq!(keys(&index), vec![1, 3, 2]);
    }

    #[test]
    fn test_evict_least_recent() {
        let mut index = OrderedIndex::new(3);
        index.insert_most_recent(1, 10);
        index.insert_most_recent(2, 20);
        index.insert_most_recent(3, 30);

        let evicted = index.evict_least_recent().unwrap();
        assert_eq!(evicted.key, 1);
        assert_eq!(keys(&index), vec![3, 2]);
        assert!(index.lookup(&1).is_none());
    }

    #[test]
    fn test_evict_empty_is_noop() {
        let mut index: OrderedIndex<i32, i32> = OrderedIndex::new(3);
        assert!(index.evict_least_recent().is_none());
    }

    #[test]
    fn test_remove_slot_head_middle_tail() {
        for target in [1, 2, 3] {
            let mut index = OrderedIndex::new(3);
            index.insert_most_recent(1, 10);
            index.insert_most_recent(2, 20);
            index.insert_most_recent(3, 30);

            let (_, entry) = index.lookup(&target).unwrap();
            let slot = entry.slot.unwrap();
            let removed = index.remove_slot(slot).unwrap();
            assert_eq!(removed.key, target);
            assert_eq!(index.len(), 2);
            assert!(index.lookup(&target).is_none());

            let survivors: Vec<i32> = [3, 2, 1].into_iter().filter(|k| *k != target).collect();
            assert_eq!(keys(&index), survivors);
        }
    }

    #[test]
    fn test_remove_slot_is_idempotent() {
        let mut index = OrderedIndex::new(3);
        let entry = index.insert_most_recent(1, 10);
        let slot = entry.slot.unwrap();

        assert!(index.remove_slot(slot).is_some());
        assert!(index.remove_slot(slot).is_none());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_stale_slot_does_not_hit_recycled_occupant() {
        let mut index = OrderedIndex::new(3);
        let old = index.insert_most_recent(1, 10);
        let old_slot = old.slot.unwrap();
        index.remove_slot(old_slot);

        // The new entry reuses the vacated slot with a newer generation
        let fresh = index.insert_most_recent(2, 20);
        assert_eq!(fresh.slot.unwrap().index, old_slot.index);
        assert_ne!(fresh.slot.unwrap().generation, old_slot.generation);

        assert!(index.remove_slot(old_slot).is_none());
        assert_eq!(index.len(), 1);
        assert!(index.lookup(&2).is_some());
    }

    #[test]
    fn test_remove_all_matching() {
        let mut index = OrderedIndex::new(10);
        for i in 0..8 {
            index.insert_most_recent(i, i * 10);
        }

        let removed = index.remove_all_matching(|key| key % 2 == 0);
        assert_eq!(removed, 4);
        assert_eq!(index.len(), 4);
        // Survivors keep their relative order
        assert_eq!(keys(&index), vec![7, 5, 3, 1]);
    }

    #[test]
    fn test_remove_all_matching_none_match() {
        let mut index = OrderedIndex::new(5);
        index.insert_most_recent(1, 10);
        index.insert_most_recent(2, 20);

        assert_eq!(index.remove_all_matching(|_| false), 0);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_clear_kills_outstanding_slots() {
        let mut index = OrderedIndex::new(3);
        let entry = index.insert_most_recent(1, 10);
        let slot = entry.slot.unwrap();
        index.insert_most_recent(2, 20);

        index.clear();
        assert_eq!(index.len(), 0);
        assert!(keys(&index).is_empty());

        // Slots are reused after a clear, but the old handle must stay dead
        let fresh = index.insert_most_recent(3, 30);
        assert!(index.remove_slot(slot).is_none());
        assert!(index.is_live(fresh.slot.unwrap()));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_slot_reuse_bounds_arena() {
        let mut index = OrderedIndex::new(2);
        for round in 0..20 {
            index.insert_most_recent(round, round);
            if index.len() > 2 {
                index.evict_least_recent();
            }
        }
        assert_eq!(index.len(), 2);
        assert!(index.arena.len() <= 3);
    }
}
