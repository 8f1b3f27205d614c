use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

struct CacheEntry<V> {
    value: Arc<V>,
    expires_at: Instant,
}

/// Concurrent key/value cache with per-entry expiry.
///
/// Lookups and inserts go through the sharded map, so readers never block
/// each other. Two tasks missing on the same key at once may both run the
/// compute closure; the computation is pure for our callers, so the extra
/// work is wasted but harmless and the last insert wins.
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Return the cached value for `key` if it has not expired, otherwise
    /// run `compute`, cache the result for `ttl`, and return it.
    pub fn fetch_or_compute<F>(&self, key: &str, ttl: Duration, compute: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return entry.value.clone();
            }
        }

        let value = Arc::new(compute());
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        value
    }

    /// Drop every entry. Used when the backing store is explicitly reloaded.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
