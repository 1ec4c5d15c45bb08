//! Hot-key detector
//!
//! Classifies keys as hot once their sketch estimate crosses a threshold,
//! tracking them in a bounded LRU set. Sketch counters decay periodically
//! so yesterday's hot keys cool off; decay is triggered lazily by the first
//! access past the deadline rather than a dedicated timer.

use super::sketch::CountMinSketch;
use crate::config::HotKeyConfig;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::debug;

/// Detects keys receiving disproportionate traffic.
pub struct HotKeyDetector {
    sketch: CountMinSketch,
    threshold: u32,
    hot: Mutex<LruCache<String, ()>>,
    decay_interval: Duration,
    decay_factor: f64,
    last_decay: Mutex<Instant>,
}

impl HotKeyDetector {
    /// Create a detector from configuration.
    pub fn new(config: &HotKeyConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_keys).unwrap_or(NonZeroUsize::MIN);

        Self {
            sketch: CountMinSketch::new(config.sketch_memory_bytes, config.sketch_depth),
            threshold: config.threshold.max(1),
            hot: Mutex::new(LruCache::new(capacity)),
            decay_interval: Duration::from_secs(config.decay_interval_seconds),
            decay_factor: config.decay_factor,
            last_decay: Mutex::new(Instant::now()),
        }
    }

    /// Record one access to `key` and report whether it is currently hot.
    ///
    /// Once a key is hot it stays hot until LRU-evicted by another
    /// promotion or cooled by decay cleanup.
    pub fn record_access(&self, key: &str) -> bool {
        self.record_access_with_delta(key, 1)
    }

    /// Record `delta` accesses to `key` and report whether it is hot.
    pub fn record_access_with_delta(&self, key: &str, delta: u32) -> bool {
        self.maybe_decay();

        let estimate = self.sketch.increment(key, delta);

        let mut hot = self.hot.lock();
        if hot.get(key).is_some() {
            // get() refreshed LRU recency.
            return true;
        }

        if estimate >= self.threshold {
            debug!("key promoted to hot (estimate {}): {}", estimate, key);
            hot.put(key.to_string(), ());
            return true;
        }

        false
    }

    /// Whether `key` is in the hot set, without recording an access.
    pub fn is_hot(&self, key: &str) -> bool {
        self.hot.lock().peek(key).is_some()
    }

    /// Current size of the hot set.
    pub fn hot_key_count(&self) -> usize {
        self.hot.lock().len()
    }

    /// Estimated access frequency of `key`.
    pub fn estimate(&self, key: &str) -> u32 {
        self.sketch.estimate(key)
    }

    /// Clear the hot set and zero the sketch.
    pub fn reset(&self) {
        self.hot.lock().clear();
        self.sketch.reset();
        *self.last_decay.lock() = Instant::now();
    }

    /// Approximate memory footprint: sketch matrix plus tracked key strings.
    pub fn memory_usage(&self) -> usize {
        let hot = self.hot.lock();
        let key_bytes: usize = hot.iter().map(|(k, _)| k.len() + 64).sum();
        self.sketch.memory_usage() + key_bytes
    }

    /// Decay sketch counters and drop cooled keys if the interval elapsed.
    /// Double-checked so concurrent callers decay at most once.
    fn maybe_decay(&self) {
        {
            let last = self.last_decay.lock();
            if last.elapsed() < self.decay_interval {
                return;
            }
        }

        {
            let mut last = self.last_decay.lock();
            if last.elapsed() < self.decay_interval {
                return;
            }
            *last = Instant::now();
        }

        self.sketch.decay(self.decay_factor);
        self.cleanup_cold_keys();
    }

    /// Remove hot keys whose decayed estimate fell below the threshold.
    fn cleanup_cold_keys(&self) {
        let mut hot = self.hot.lock();
        let cooled: Vec<String> = hot
            .iter()
            .filter(|(key, _)| self.sketch.estimate(key) < self.threshold)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &cooled {
            hot.pop(key);
        }

        if !cooled.is_empty() {
            debug!("decay cooled {} hot key(s)", cooled.len());
        }
    }
}
