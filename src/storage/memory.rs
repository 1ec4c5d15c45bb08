//! In-process counter store
//!
//! Backs single-node deployments and the test suite. Counters expire
//! lazily against the injected time source. A synthetic slot count can be
//! configured so the dispatcher's multi-slot paths are exercisable without
//! a live cluster.

use crate::storage::redis::slot::cluster_slot;
use crate::storage::{CounterStore, Pipeline, StoreOp};
use crate::utils::error::Result;
use crate::utils::time::{SystemTimeSource, TimeSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct CounterEntry {
    value: u64,
    expires_at: Option<i64>,
}

/// Counters for executed work, for monitoring and assertions.
#[derive(Debug, Default)]
pub struct MemoryStoreStats {
    /// Pipelines executed since construction
    pub pipelines_executed: AtomicU64,
    /// Individual commands executed since construction
    pub commands_executed: AtomicU64,
}

/// An in-process [`CounterStore`].
pub struct MemoryStore {
    slots: u16,
    time: Arc<dyn TimeSource>,
    entries: Mutex<HashMap<String, CounterEntry>>,
    stats: MemoryStoreStats,
}

impl MemoryStore {
    /// Create a single-slot store on the system clock.
    pub fn new() -> Self {
        Self::with_slots(1)
    }

    /// Create a store that spreads keys over `slots` synthetic shard slots.
    pub fn with_slots(slots: u16) -> Self {
        Self {
            slots: slots.max(1),
            time: Arc::new(SystemTimeSource),
            entries: Mutex::new(HashMap::new()),
            stats: MemoryStoreStats::default(),
        }
    }

    /// Replace the time source (tests pin the clock through this).
    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Current value of `key`, honouring expiry.
    pub fn value(&self, key: &str) -> Option<u64> {
        let now = self.time.unix_now();
        let entries = self.entries.lock();
        entries.get(key).and_then(|e| match e.expires_at {
            Some(deadline) if deadline <= now => None,
            _ => Some(e.value),
        })
    }

    /// Remaining TTL of `key` in seconds, if one is set.
    pub fn ttl(&self, key: &str) -> Option<i64> {
        let now = self.time.unix_now();
        let entries = self.entries.lock();
        entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|deadline| deadline - now)
            .filter(|remaining| *remaining > 0)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = self.time.unix_now();
        self.entries
            .lock()
            .values()
            .filter(|e| match e.expires_at {
                Some(deadline) => deadline > now,
                None => true,
            })
            .count()
    }

    /// Whether the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Execution counters.
    pub fn stats(&self) -> &MemoryStoreStats {
        &self.stats
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    fn is_cluster(&self) -> bool {
        self.slots > 1
    }

    fn slot(&self, key: &str) -> u16 {
        if self.slots <= 1 {
            0
        } else {
            cluster_slot(key) % self.slots
        }
    }

    async fn run_pipeline(&self, pipeline: &Pipeline) -> Result<Vec<Option<u64>>> {
        let now = self.time.unix_now();
        let mut entries = self.entries.lock();
        let mut replies = Vec::with_capacity(pipeline.len());

        for op in pipeline.ops() {
            match op {
                StoreOp::IncrBy { key, delta } => {
                    let entry = entries.entry(key.clone()).or_insert(CounterEntry {
                        value: 0,
                        expires_at: None,
                    });
                    if matches!(entry.expires_at, Some(deadline) if deadline <= now) {
                        entry.value = 0;
                        entry.expires_at = None;
                    }
                    entry.value = entry.value.saturating_add(*delta);
                    replies.push(Some(entry.value));
                }
                StoreOp::Expire { key, seconds } => {
                    if let Some(entry) = entries.get_mut(key) {
                        entry.expires_at = Some(now + seconds);
                    }
                    replies.push(None);
                }
                StoreOp::Get { key } => {
                    let live = entries.get(key).and_then(|e| match e.expires_at {
                        Some(deadline) if deadline <= now => None,
                        _ => Some(e.value),
                    });
                    replies.push(live);
                }
            }
        }

        self.stats.pipelines_executed.fetch_add(1, Ordering::Relaxed);
        self.stats
            .commands_executed
            .fetch_add(pipeline.len() as u64, Ordering::Relaxed);

        Ok(replies)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
