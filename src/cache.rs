//! Cache engine
//!
//! [`HybridCache`] orchestrates get-or-compute over the ordered index:
//! hits promote to most-recent, misses run the caller's [`Computable`] and
//! insert at most-recent, and an over-capacity insert evicts exactly one
//! least-recent entry. Two further removal paths bypass recency order:
//! direct handle removal ([`CacheEntry::remove_from_cache`]) and filtered
//! bulk removal ([`HybridCache::release_matching`]).
//!
//! ## Locking
//!
//! One mutex guards the index and the pending-computation map. The value
//! computer runs with the lock released; a per-key reservation claimed under
//! the lock guarantees at most one in-flight computation per key while
//! computations for different keys proceed in parallel. Waiters block on
//! their key's reservation only, never on the cache-wide lock.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::compute::Computable;
use crate::config::CacheConfig;
use crate::entry::{CacheEntry, Slot};
use crate::error::{Error, Result};
use crate::index::OrderedIndex;

// ============================================================================
// Statistics
// ============================================================================

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Lookups served from a live entry
    pub hits: u64,
    /// Lookups that ran the value computer
    pub misses: u64,
    /// Entries dropped by capacity eviction
    pub evictions: u64,
    /// Entries dropped through a handle
    pub removals: u64,
    /// Entries dropped by `release_matching`
    pub released: u64,
    /// Lookups that joined another caller's in-flight computation
    pub coalesced: u64,
}

impl CacheStats {
    /// Hit rate as a fraction [0.0, 1.0]. Returns 0.0 if no lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    /// Total number of compute() calls that resolved against the index
    pub fn total_lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

// ============================================================================
// In-flight reservation
// ============================================================================

/// Per-key placeholder for a computation in progress
///
/// Claimed under the structural lock, resolved after the computer returns.
/// Waiters park on the condvar of their key's reservation, so one slow key
/// never serializes lookups of other keys.
struct InFlight<K, V> {
    outcome: Mutex<Option<std::result::Result<CacheEntry<K, V>, String>>>,
    ready: Condvar,
}

impl<K, V> InFlight<K, V> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn publish(&self, result: std::result::Result<CacheEntry<K, V>, String>) {
        let mut outcome = self.outcome.lock();
        *outcome = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self) -> Result<CacheEntry<K, V>> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(result) = outcome.as_ref() {
                return match result {
                    Ok(entry) => Ok(entry.clone()),
                    Err(message) => Err(Error::computation(message.clone())),
                };
            }
            self.ready.wait(&mut outcome);
        }
    }
}

// ============================================================================
// Shared state
// ============================================================================

pub(crate) struct CacheShared<K, V> {
    state: Mutex<CacheState<K, V>>,
}

struct CacheState<K, V> {
    index: OrderedIndex<K, V>,
    pending: HashMap<K, Arc<InFlight<K, V>>>,
    stats: CacheStats,
}

impl<K: Hash + Eq + Clone, V> CacheShared<K, V> {
    /// Handle-directed removal, reached through [`CacheEntry::remove_from_cache`]
    pub(crate) fn remove_slot(&self, slot: Slot) {
        let mut state = self.state.lock();
        if state.index.remove_slot(slot).is_some() {
            state.stats.removals += 1;
            trace!(len = state.index.len(), "removed cache entry via handle");
        }
    }

    pub(crate) fn is_live(&self, slot: Slot) -> bool {
        self.state.lock().index.is_live(slot)
    }
}

// ============================================================================
// HybridCache
// ============================================================================

/// Bounded, recency-ordered memoizing cache
///
/// ```text
/// compute(key)
///    │
///    ├─ hit ──────► touch (move to most-recent), return handle
///    │
///    └─ miss ─────► claim per-key reservation
///                      │  (lock released)
///                      ▼
///                 Computable::compute(key)
///                      │
///                      ├─ cached ────► insert at most-recent,
///                      │               evict least-recent if over capacity
///                      └─ transient ─► return handle, nothing stored
/// ```
///
/// Clones share the same underlying cache, so a cache can be handed to
/// worker threads the way an `Arc` would be.
///
/// # Example
///
/// ```rust,ignore
/// use hybrid_lru::{Computed, HybridCache};
///
/// let cache = HybridCache::new(3, |key: &u32| -> anyhow::Result<Computed<String>> {
///     Ok(Computed::cached(format!("value-{key}")))
/// })?;
///
/// let entry = cache.compute(&1)?;          // miss: computes "value-1"
/// assert_eq!(entry.value(), "value-1");
/// let again = cache.compute(&1)?;          // hit: no recomputation
/// entry.remove_from_cache();               // direct removal, idempotent
/// cache.release_matching(|k| k % 2 == 0);  // filtered bulk removal
/// ```
pub struct HybridCache<K, V> {
    shared: Arc<CacheShared<K, V>>,
    computer: Arc<dyn Computable<K, V>>,
}

impl<K, V> Clone for HybridCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            computer: Arc::clone(&self.computer),
        }
    }
}

impl<K, V> HybridCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a cache with the given capacity and value computer
    ///
    /// Fails with [`Error::Config`] if `capacity` is below 1.
    pub fn new(capacity: usize, computer: impl Computable<K, V> + 'static) -> Result<Self> {
        Self::with_config(CacheConfig::with_capacity(capacity), computer)
    }

    /// Create a cache from a [`CacheConfig`]
    pub fn with_config(
        config: CacheConfig,
        computer: impl Computable<K, V> + 'static,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(CacheShared {
                state: Mutex::new(CacheState {
                    index: OrderedIndex::new(config.capacity),
                    pending: HashMap::new(),
                    stats: CacheStats::default(),
                }),
            }),
            computer: Arc::new(computer),
        })
    }

    /// Get-or-compute the entry for `key`
    ///
    /// On a hit the live entry is promoted to most-recent and returned; the
    /// computer is not invoked. On a miss the computer runs exactly once for
    /// this key, no matter how many threads miss concurrently; the others
    /// wait on the reservation and reuse the published result.
    ///
    /// A computer failure is propagated and nothing is cached, so a later
    /// call retries from scratch. Waiters on a failed reservation observe
    /// the failure as well.
    pub fn compute(&self, key: &K) -> Result<CacheEntry<K, V>> {
        let inflight = {
            let mut state = self.shared.state.lock();

            if let Some((idx, inner)) = state.index.lookup(key) {
                state.index.touch(idx);
                state.stats.hits += 1;
                return Ok(CacheEntry {
                    inner,
                    cache: Arc::downgrade(&self.shared),
                });
            }

            if let Some(existing) = state.pending.get(key) {
                let existing = Arc::clone(existing);
                state.stats.coalesced += 1;
                existing
            } else {
                let claimed = Arc::new(InFlight::new());
                state.pending.insert(key.clone(), Arc::clone(&claimed));
                state.stats.misses += 1;
                drop(state);
                return self.compute_and_publish(key, &claimed);
            }
        };

        inflight.wait()
    }

    /// Remove every live entry whose key matches the filter
    ///
    /// Applied atomically with respect to `compute` and handle removal:
    /// a concurrent lookup sees the key either fully present or fully
    /// absent. Survivors keep their relative recency order. The value
    /// computer is never invoked.
    pub fn release_matching<F>(&self, filter: F)
    where
        F: FnMut(&K) -> bool,
    {
        let mut state = self.shared.state.lock();
        let removed = state.index.remove_all_matching(filter);
        if removed > 0 {
            state.stats.released += removed as u64;
            debug!(removed, "released cache entries matching filter");
        }
    }

    /// Drop all entries
    ///
    /// Subsequent computes behave as on a fresh cache.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        let dropped = state.index.len();
        state.index.clear();
        debug!(dropped, "cache cleared");
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.shared.state.lock().index.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The fixed capacity
    pub fn capacity(&self) -> usize {
        self.shared.state.lock().index.capacity()
    }

    /// Snapshot of the live keys in recency order, most recent first
    pub fn keys(&self) -> Vec<K> {
        self.shared.state.lock().index.keys_most_recent_first()
    }

    /// Snapshot of the cache statistics
    pub fn stats(&self) -> CacheStats {
        self.shared.state.lock().stats.clone()
    }

    /// Run the computer for a claimed reservation and publish the outcome
    fn compute_and_publish(
        &self,
        key: &K,
        inflight: &Arc<InFlight<K, V>>,
    ) -> Result<CacheEntry<K, V>> {
        // If the computer unwinds, the guard tears the reservation down and
        // fails the waiters instead of leaving them parked.
        let guard = ReservationGuard {
            shared: &self.shared,
            key,
            inflight,
        };

        match self.computer.compute(key) {
            Ok(computed) => {
                let (value, retain) = computed.into_parts();
                let entry = {
                    let mut state = self.shared.state.lock();
                    state.pending.remove(key);
                    if retain {
                        let inner = state.index.insert_most_recent(key.clone(), value);
                        if state.index.len() > state.index.capacity()
                            && state.index.evict_least_recent().is_some()
                        {
                            state.stats.evictions += 1;
                            trace!(len = state.index.len(), "evicted least-recently-used entry");
                        }
                        CacheEntry {
                            inner,
                            cache: Arc::downgrade(&self.shared),
                        }
                    } else {
                        CacheEntry::detached(key.clone(), value)
                    }
                };
                guard.defuse();
                inflight.publish(Ok(entry.clone()));
                Ok(entry)
            }
            Err(err) => {
                {
                    let mut state = self.shared.state.lock();
                    state.pending.remove(key);
                }
                guard.defuse();
                inflight.publish(Err(err.to_string()));
                Err(Error::Compute(err))
            }
        }
    }
}

impl<K, V> fmt::Debug for HybridCache<K, V>
where
    K: Hash + Eq + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("HybridCache")
            .field("capacity", &state.index.capacity())
            .field("len", &state.index.len())
            .field("stats", &state.stats)
            .finish()
    }
}

/// Tears down a claimed reservation if the computation unwinds
struct ReservationGuard<'a, K: Hash + Eq + Clone, V> {
    shared: &'a Arc<CacheShared<K, V>>,
    key: &'a K,
    inflight: &'a Arc<InFlight<K, V>>,
}

impl<K: Hash + Eq + Clone, V> ReservationGuard<'_, K, V> {
    fn defuse(self) {
        std::mem::forget(self);
    }
}

impl<K: Hash + Eq + Clone, V> Drop for ReservationGuard<'_, K, V> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.pending.remove(self.key);
        drop(state);
        self.inflight
            .publish(Err("value computation panicked".to_string()));
    }
}

// ============================================================================
// Tests
// ============================================================================
