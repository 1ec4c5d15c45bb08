//! Local over-limit cache
//!
//! Memoizes OVER_LIMIT verdicts so repeat offenders are refused without a
//! store round-trip. Entries carry the deadline of their window's end and
//! invalidate themselves when it passes; capacity pressure may evict them
//! earlier, which only costs a store round-trip.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// Approximate per-entry footprint: key bytes plus deadline and LRU
/// bookkeeping. Maps the configured byte budget to an entry capacity.
const APPROX_ENTRY_BYTES: usize = 128;

/// Fixed-capacity map from counter key to over-limit deadline (unix seconds).
pub struct OverLimitCache {
    entries: Mutex<LruCache<String, i64>>,
}

impl OverLimitCache {
    /// Create a cache with an explicit entry capacity.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Create a cache from a byte budget; `None` when the budget is zero.
    pub fn from_size_bytes(size_bytes: usize) -> Option<Self> {
        if size_bytes == 0 {
            return None;
        }
        let capacity = NonZeroUsize::new((size_bytes / APPROX_ENTRY_BYTES).max(8))
            .unwrap_or(NonZeroUsize::MIN);
        Some(Self::new(capacity))
    }

    /// Whether `key` is memoized over-limit at `now`. Expired entries are
    /// dropped on the way out.
    pub fn is_over_limit(&self, key: &str, now: i64) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(&deadline) if deadline > now => true,
            Some(_) => {
                entries.pop(key);
                false
            }
            None => false,
        }
    }

    /// Memoize `key` as over-limit until `deadline` (unix seconds).
    pub fn mark_over_limit(&self, key: &str, deadline: i64) {
        self.entries.lock().put(key.to_string(), deadline);
    }

    /// Number of entries currently held (including not-yet-collected
    /// expired ones).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
