//! Cache entry handles
//!
//! A [`CacheEntry`] is the non-owning reference handed to callers by
//! `compute`. It stays readable for as long as the caller holds it, even
//! after the underlying entry has been evicted or removed; removal through
//! the handle is keyed by slot identity, not by position, and is idempotent.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use crate::cache::CacheShared;

/// Stable slot identity inside the ordered index
///
/// The generation counter distinguishes the current occupant of an arena
/// slot from earlier occupants, so a stale handle can never remove an entry
/// that recycled its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) index: usize,
    pub(crate) generation: u64,
}

/// Shared entry payload, exclusively owned by the index while live
#[derive(Debug)]
pub(crate) struct EntryInner<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    /// `None` for transient entries that were never inserted
    pub(crate) slot: Option<Slot>,
}

/// Handle to a cached key-value pair
///
/// Cloning the handle is cheap and clones share identity: removing through
/// any clone removes the one underlying entry. A handle obtained after a
/// recompute of the same key is a distinct entry with its own identity.
pub struct CacheEntry<K, V> {
    pub(crate) inner: Arc<EntryInner<K, V>>,
    pub(crate) cache: Weak<CacheShared<K, V>>,
}

impl<K, V> Clone for CacheEntry<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cache: Weak::clone(&self.cache),
        }
    }
}

impl<K, V> CacheEntry<K, V> {
    pub(crate) fn detached(key: K, value: V) -> Self {
        Self {
            inner: Arc::new(EntryInner {
                key,
                value,
                slot: None,
            }),
            cache: Weak::new(),
        }
    }

    /// The key this entry was computed for
    pub fn key(&self) -> &K {
        &self.inner.key
    }

    /// The stored value
    ///
    /// Valid for the life of the handle, regardless of what the owning
    /// cache has done with the entry since.
    pub fn value(&self) -> &V {
        &self.inner.value
    }
}

impl<K: Hash + Eq + Clone, V> CacheEntry<K, V> {
    /// Remove exactly this entry from its owning cache
    ///
    /// Works wherever the entry currently sits in the recency order.
    /// Idempotent: calling it again, or after the entry was independently
    /// evicted, filtered, or cleared, has no effect.
    pub fn remove_from_cache(&self) {
        let Some(slot) = self.inner.slot else {
            return;
        };
        if let Some(shared) = self.cache.upgrade() {
            shared.remove_slot(slot);
        }
    }

    /// Whether this exact entry is still live in its cache
    ///
    /// Always `false` for transient entries and after the entry has been
    /// removed by any path. A later recompute of the same key does not make
    /// this handle live again.
    pub fn is_cached(&self) -> bool {
        let Some(slot) = self.inner.slot else {
            return false;
        };
        match self.cache.upgrade() {
            Some(shared) => shared.is_live(slot),
            None => false,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CacheEntry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.inner.key)
            .field("value", &self.inner.value)
            .field("slot", &self.inner.slot)
            .finish()
    }
}
