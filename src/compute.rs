//! Value computation strategy
//!
//! The cache never produces values itself; callers supply a [`Computable`]
//! that is invoked exactly once per missing key. The strategy decides per
//! result whether the entry is retained in the cache or handed back without
//! being stored.

/// Memoization strategy: produces the value for a missing key
///
/// Invoked by [`HybridCache::compute`](crate::HybridCache::compute) on a
/// cache miss, outside the cache's structural lock, so a slow computation
/// for one key never blocks lookups of other keys.
///
/// A failure propagates to the calling `compute` and nothing is cached for
/// the key.
pub trait Computable<K, V>: Send + Sync {
    /// Produce the value for `key`
    fn compute(&self, key: &K) -> anyhow::Result<Computed<V>>;
}

impl<K, V, F> Computable<K, V> for F
where
    F: Fn(&K) -> anyhow::Result<Computed<V>> + Send + Sync,
{
    fn compute(&self, key: &K) -> anyhow::Result<Computed<V>> {
        (self)(key)
    }
}

/// A computed value plus its retention policy
///
/// [`Computed::cached`] results are inserted at the most-recent position and
/// participate in LRU eviction. [`Computed::transient`] results are returned
/// to the caller but never stored, so the next compute for the same key runs
/// the strategy again.
#[derive(Debug)]
pub struct Computed<V> {
    value: V,
    retain: bool,
}

impl<V> Computed<V> {
    /// A result that is retained in the cache
    pub fn cached(value: V) -> Self {
        Self {
            value,
            retain: true,
        }
    }

    /// A result handed back without being cached
    pub fn transient(value: V) -> Self {
        Self {
            value,
            retain: false,
        }
    }

    /// Whether this result will be retained in the cache
    pub fn is_retained(&self) -> bool {
        self.retain
    }

    pub(crate) fn into_parts(self) -> (V, bool) {
        (self.value, self.retain)
    }
}
