//! Multi-slot dispatch and failure propagation

use crate::common::{limiter, request, MockTime};
use async_trait::async_trait;
use ratelimit_rs::core::limiter::FixedWindowLimiter;
use ratelimit_rs::storage::{CounterStore, MemoryStore, Pipeline, SlotPipelines, StoreOp};
use ratelimit_rs::utils::error::{Error, Result};
use ratelimit_rs::{RateLimit, Settings, Unit};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Wraps a memory store and fails every pipeline aimed at one slot.
struct ShardFailingStore {
    inner: MemoryStore,
    failing_slot: u16,
}

#[async_trait]
impl CounterStore for ShardFailingStore {
    fn slot(&self, key: &str) -> u16 {
        self.inner.slot(key)
    }

    async fn run_pipeline(&self, pipeline: &Pipeline) -> Result<Vec<Option<u64>>> {
        if let Some(op) = pipeline.ops().first() {
            if self.slot(op.key()) == self.failing_slot {
                return Err(Error::Store(format!(
                    "shard for slot {} is down",
                    self.failing_slot
                )));
            }
        }
        self.inner.run_pipeline(pipeline).await
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_pipelines_preserve_single_slot_invariant() {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::with_slots(8));
    let mut pipelines = SlotPipelines::new();

    let keys: Vec<String> = (0..32).map(|i| format!("key-{}", i)).collect();
    for (i, key) in keys.iter().enumerate() {
        pipelines.push(
            store.as_ref(),
            i,
            StoreOp::IncrBy {
                key: key.clone(),
                delta: 1,
            },
        );
    }

    let distinct_slots: std::collections::HashSet<u16> =
        keys.iter().map(|k| store.slot(k)).collect();
    assert_eq!(pipelines.slot_count(), distinct_slots.len());

    let mut results = vec![0u64; keys.len()];
    pipelines.execute(&store, &mut results).await.unwrap();
    assert!(results.iter().all(|&v| v == 1));
}

#[tokio::test]
async fn test_one_shard_failure_fails_the_whole_request() {
    // Find two values landing on different slots, then break one of them.
    let probe = MemoryStore::with_slots(8);
    let key_of = |v: &str| format!("edge_api_key_{}_1699999980", v);

    let first = "a";
    let mut second = None;
    for candidate in ["b", "c", "d", "e", "f", "g", "h"] {
        if probe.slot(&key_of(candidate)) != probe.slot(&key_of(first)) {
            second = Some(candidate);
            break;
        }
    }
    let second = second.expect("some candidate must land on another slot");

    let store = Arc::new(ShardFailingStore {
        failing_slot: probe.slot(&key_of(second)),
        inner: MemoryStore::with_slots(8),
    });
    let time = MockTime::at(1_700_000_000);
    let engine = FixedWindowLimiter::new(
        store as Arc<dyn CounterStore>,
        None,
        &Settings::default(),
        time,
    );

    let rules = [
        Some(RateLimit::new(10, Unit::Minute)),
        Some(RateLimit::new(10, Unit::Minute)),
    ];
    let err = engine
        .do_limit(&request(&[first, second]), &rules)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("is down"));
}

#[tokio::test]
async fn test_parallel_slot_pipelines_through_the_engine() {
    let store = Arc::new(MemoryStore::with_slots(16384));
    let time = MockTime::at(1_700_000_000);
    let engine = limiter(store.clone(), &Settings::default(), time);

    let values: Vec<String> = (0..12).map(|i| format!("tenant-{}", i)).collect();
    let value_refs: Vec<&str> = values.iter().map(String::as_str).collect();
    let rules: Vec<_> = values
        .iter()
        .map(|_| Some(RateLimit::new(100, Unit::Minute)))
        .collect();

    engine.do_limit(&request(&value_refs), &rules).await.unwrap();

    let distinct_slots: std::collections::HashSet<u16> = values
        .iter()
        .map(|v| store.slot(&format!("edge_api_key_{}_1699999980", v)))
        .collect();

    // One pipeline execution per touched slot, nothing more.
    assert_eq!(
        store.stats().pipelines_executed.load(Ordering::Relaxed),
        distinct_slots.len() as u64
    );
}

#[tokio::test]
async fn test_hash_tags_force_colocated_pipelines() {
    let store: Arc<dyn CounterStore> = Arc::new(MemoryStore::with_slots(16384));
    let mut pipelines = SlotPipelines::new();

    for (i, key) in ["{user9}.minute", "{user9}.hour", "{user9}.day"]
        .iter()
        .enumerate()
    {
        pipelines.push(
            store.as_ref(),
            i,
            StoreOp::IncrBy {
                key: key.to_string(),
                delta: 1,
            },
        );
    }

    assert_eq!(pipelines.slot_count(), 1);
}
