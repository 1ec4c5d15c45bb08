//! Hot-key micro-batcher
//!
//! Coalesces concurrent increments for the same key into a single store
//! operation, flushed on a short periodic tick. Submitters receive a
//! one-shot promise resolving to the counter value as if their increment
//! had been applied individually, in submit order.

use crate::storage::{CounterStore, SlotPipelines, StoreOp};
use crate::utils::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One request waiting for a batched result.
struct Waiter {
    hits: u64,
    tx: oneshot::Sender<Result<u64>>,
}

/// Aggregated increments for one key within the current flush window.
struct PendingEntry {
    total_hits: u64,
    expire_seconds: i64,
    waiters: Vec<Waiter>,
}

/// Batches INCRBY/EXPIRE traffic for hot keys.
///
/// Submits may proceed concurrently with flushes: the flush worker swaps
/// the pending map for a fresh one before touching the store, so no lock
/// spans I/O.
pub struct HotKeyBatcher {
    store: Arc<dyn CounterStore>,
    flush_window: Duration,
    pending: Arc<Mutex<HashMap<String, PendingEntry>>>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HotKeyBatcher {
    /// Create a batcher flushing to `store` every `flush_window`.
    pub fn new(store: Arc<dyn CounterStore>, flush_window: Duration) -> Self {
        let flush_window = if flush_window.is_zero() {
            Duration::from_micros(300)
        } else {
            flush_window
        };

        let (shutdown, _) = watch::channel(false);

        Self {
            store,
            flush_window,
            pending: Arc::new(Mutex::new(HashMap::new())),
            shutdown,
            worker: Mutex::new(None),
        }
    }

    /// Launch the background flush worker. Idempotent.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let store = Arc::clone(&self.store);
        let pending = Arc::clone(&self.pending);
        let mut shutdown = self.shutdown.subscribe();
        let flush_window = self.flush_window;

        *worker = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(flush_window);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        Self::flush(&store, &pending).await;
                    }
                    _ = shutdown.changed() => {
                        // Final flush drains everything submitted so far.
                        Self::flush(&store, &pending).await;
                        break;
                    }
                }
            }
        }));

        debug!("hot key batcher started (flush window {:?})", flush_window);
    }

    /// Stop the worker after a final draining flush.
    pub async fn stop(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = self.shutdown.send(true);
            let _ = handle.await;
            debug!("hot key batcher stopped");
        }
    }

    /// Queue `hits` for `key` and return a promise for the post-increment
    /// count. The entry's TTL is the maximum submitted for the key this
    /// window.
    pub fn submit(&self, key: &str, hits: u64, expire_seconds: i64) -> oneshot::Receiver<Result<u64>> {
        let (tx, rx) = oneshot::channel();

        let mut pending = self.pending.lock();
        let entry = pending
            .entry(key.to_string())
            .or_insert_with(|| PendingEntry {
                total_hits: 0,
                expire_seconds,
                waiters: Vec::with_capacity(4),
            });

        entry.total_hits += hits;
        entry.expire_seconds = entry.expire_seconds.max(expire_seconds);
        entry.waiters.push(Waiter { hits, tx });

        rx
    }

    /// Number of keys currently pending.
    pub fn pending_key_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Total waiters across all pending keys.
    pub fn pending_waiter_count(&self) -> usize {
        self.pending.lock().values().map(|e| e.waiters.len()).sum()
    }

    /// The configured flush tick.
    pub fn flush_window(&self) -> Duration {
        self.flush_window
    }

    /// Swap out the pending map and push one slot-grouped pipeline of
    /// aggregated increments, then settle every waiter.
    async fn flush(
        store: &Arc<dyn CounterStore>,
        pending: &Arc<Mutex<HashMap<String, PendingEntry>>>,
    ) {
        let batch = {
            let mut pending = pending.lock();
            if pending.is_empty() {
                return;
            }
            std::mem::take(&mut *pending)
        };

        let entries: Vec<(String, PendingEntry)> = batch.into_iter().collect();

        let mut pipelines = SlotPipelines::new();
        for (i, (key, entry)) in entries.iter().enumerate() {
            pipelines.push(
                store.as_ref(),
                i,
                StoreOp::IncrBy {
                    key: key.clone(),
                    delta: entry.total_hits,
                },
            );
            pipelines.push(
                store.as_ref(),
                i,
                StoreOp::Expire {
                    key: key.clone(),
                    seconds: entry.expire_seconds,
                },
            );
        }

        let mut final_counts = vec![0u64; entries.len()];
        match pipelines.execute(store, &mut final_counts).await {
            Ok(()) => {
                for ((_, entry), final_count) in entries.into_iter().zip(final_counts) {
                    Self::settle_waiters(entry, final_count);
                }
            }
            Err(e) => {
                warn!("hot key flush failed: {}", e);
                for (_, entry) in entries {
                    for waiter in entry.waiters {
                        let _ = waiter.tx.send(Err(e.shared()));
                    }
                }
            }
        }
    }

    /// Allocate per-waiter results from the post-batch count.
    ///
    /// `final_count` reflects every increment in the batch. Walking the
    /// waiter list in reverse and subtracting each addend reconstructs the
    /// counter value each waiter would have observed had its increment been
    /// applied alone, in submit order. A forward walk from a pre-read value
    /// would be stale by flush time; this derivation is exact and needs no
    /// extra round-trip.
    fn settle_waiters(entry: PendingEntry, final_count: u64) {
        let mut results = vec![0u64; entry.waiters.len()];
        let mut running = final_count;
        for (i, waiter) in entry.waiters.iter().enumerate().rev() {
            results[i] = running;
            running = running.saturating_sub(waiter.hits);
        }

        for (waiter, value) in entry.waiters.into_iter().zip(results) {
            let _ = waiter.tx.send(Ok(value));
        }
    }
}
