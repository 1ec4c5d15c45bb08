//! Hot-key coalescing end to end

use crate::common::{limiter, request, MockTime};
use ratelimit_rs::core::hotkey::{HotKeyBatcher, HotKeyDetector};
use ratelimit_rs::storage::MemoryStore;
use ratelimit_rs::{RateLimit, Settings, Unit, VerdictCode};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn hot_key_config(threshold: u32) -> ratelimit_rs::config::HotKeyConfig {
    ratelimit_rs::config::HotKeyConfig {
        enabled: true,
        threshold,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_hundred_concurrent_submits_coalesce_into_one_increment() {
    let store = Arc::new(MemoryStore::new());
    let batcher = HotKeyBatcher::new(
        store.clone() as Arc<dyn ratelimit_rs::storage::CounterStore>,
        Duration::from_micros(300),
    );

    // All 100 land in the pending map before the worker starts, so they
    // flush in a single tick.
    let receivers: Vec<_> = (0..100).map(|_| batcher.submit("K", 1, 60)).collect();
    assert_eq!(batcher.pending_waiter_count(), 100);

    batcher.start();
    for (i, rx) in receivers.into_iter().enumerate() {
        let value = rx.await.unwrap().unwrap();
        assert_eq!(value, i as u64 + 1, "waiter {} saw the wrong count", i);
    }
    batcher.stop().await;

    // Exactly one INCRBY (plus its EXPIRE) reached the store.
    assert_eq!(store.stats().pipelines_executed.load(Ordering::Relaxed), 1);
    assert_eq!(store.stats().commands_executed.load(Ordering::Relaxed), 2);
    assert_eq!(store.value("K"), Some(100));
}

#[tokio::test]
async fn test_batched_results_reconstruct_individual_increments() {
    let store = Arc::new(MemoryStore::new());
    crate::common::seed(&store, "K", 50).await;

    let batcher = HotKeyBatcher::new(
        store.clone() as Arc<dyn ratelimit_rs::storage::CounterStore>,
        Duration::from_micros(300),
    );

    let rx1 = batcher.submit("K", 2, 60);
    let rx2 = batcher.submit("K", 3, 60);
    let rx3 = batcher.submit("K", 1, 60);

    batcher.start();
    // Each waiter sees the counter as if only its own increment had been
    // applied, in submit order: 50+2, 52+3, 55+1.
    assert_eq!(rx1.await.unwrap().unwrap(), 52);
    assert_eq!(rx2.await.unwrap().unwrap(), 55);
    assert_eq!(rx3.await.unwrap().unwrap(), 56);
    batcher.stop().await;
}

#[tokio::test]
async fn test_engine_verdicts_are_exact_through_the_batcher() {
    let store = Arc::new(MemoryStore::new());
    let time = MockTime::at(1_700_000_000);
    let mut settings = Settings::default();
    settings.hot_key = hot_key_config(1); // every key is hot immediately
    let engine = limiter(store.clone(), &settings, time);

    let rules = [Some(RateLimit::new(5, Unit::Minute))];
    let req = request(&["K"]);

    for expected_remaining in (0..5).rev() {
        let verdicts = engine.do_limit(&req, &rules).await.unwrap();
        assert_eq!(verdicts[0].code, VerdictCode::Ok);
        assert_eq!(verdicts[0].limit_remaining, expected_remaining);
    }

    let verdicts = engine.do_limit(&req, &rules).await.unwrap();
    assert_eq!(verdicts[0].code, VerdictCode::OverLimit);

    engine.close().await;
}

#[tokio::test]
async fn test_concurrent_engine_requests_on_a_hot_key() {
    let store = Arc::new(MemoryStore::new());
    let time = MockTime::at(1_700_000_000);
    let mut settings = Settings::default();
    settings.hot_key = hot_key_config(1);
    let engine = Arc::new(limiter(store.clone(), &settings, time));

    let rules = [Some(RateLimit::new(1_000, Unit::Minute))];
    let mut handles = Vec::new();
    for _ in 0..50 {
        let engine = Arc::clone(&engine);
        let rules = rules.clone();
        handles.push(tokio::spawn(async move {
            engine.do_limit(&request(&["K"]), &rules).await
        }));
    }

    let mut remainings = Vec::new();
    for handle in handles {
        let verdicts = handle.await.unwrap().unwrap();
        assert_eq!(verdicts[0].code, VerdictCode::Ok);
        remainings.push(verdicts[0].limit_remaining);
    }

    // Every request got a distinct post-increment view of the counter.
    remainings.sort_unstable();
    remainings.dedup();
    assert_eq!(remainings.len(), 50);
    assert_eq!(store.value("edge_api_key_K_1699999980"), Some(50));

    engine.close().await;
}

#[tokio::test]
async fn test_detector_hot_set_stays_bounded_under_churn() {
    let mut config = hot_key_config(1);
    config.max_keys = 16;
    let detector = HotKeyDetector::new(&config);

    for i in 0..1_000 {
        detector.record_access(&format!("key-{}", i));
        assert!(detector.hot_key_count() <= 16);
    }
    assert_eq!(detector.hot_key_count(), 16);
}
