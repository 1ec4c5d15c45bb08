//! End-to-end engine scenarios

use crate::common::{descriptor, limiter, request, seed, MockTime};
use ratelimit_rs::storage::MemoryStore;
use ratelimit_rs::{RateLimit, RateLimitRequest, Settings, Unit, VerdictCode};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_single_descriptor_under_limit_populates_store() {
    let store = Arc::new(MemoryStore::new());
    let time = MockTime::at(1_700_000_000);
    let engine = limiter(store.clone(), &Settings::default(), time);

    let rule = RateLimit::new(50, Unit::Second);
    let verdicts = engine
        .do_limit(&request(&["X"]), &[Some(rule.clone())])
        .await
        .unwrap();

    assert_eq!(verdicts[0].code, VerdictCode::Ok);
    assert_eq!(verdicts[0].current_limit, Some(rule));
    assert_eq!(verdicts[0].limit_remaining, 49);
    assert_eq!(verdicts[0].duration_until_reset.as_secs(), 1);

    assert_eq!(store.value("edge_api_key_X_1700000000"), Some(1));
    assert_eq!(store.ttl("edge_api_key_X_1700000000"), Some(1));
}

#[tokio::test]
async fn test_quota_exhaustion_then_denial() {
    let store = Arc::new(MemoryStore::new());
    let time = MockTime::at(1_700_000_000);
    let engine = limiter(store, &Settings::default(), time);

    let rules = [Some(RateLimit::new(10, Unit::Minute))];
    let req = request(&["X"]);

    for expected_remaining in (0..10).rev() {
        let verdicts = engine.do_limit(&req, &rules).await.unwrap();
        assert_eq!(verdicts[0].code, VerdictCode::Ok);
        assert_eq!(verdicts[0].limit_remaining, expected_remaining);
    }

    let verdicts = engine.do_limit(&req, &rules).await.unwrap();
    assert_eq!(verdicts[0].code, VerdictCode::OverLimit);
    assert_eq!(verdicts[0].limit_remaining, 0);
}

#[tokio::test]
async fn test_multi_descriptor_multi_slot_request() {
    // Spread keys over the full slot range so several pipelines run.
    let store = Arc::new(MemoryStore::with_slots(16384));
    let time = MockTime::at(1_700_000_000);
    let engine = limiter(store.clone(), &Settings::default(), time);

    let values = ["a", "b", "c", "d", "e"];
    let rules: Vec<_> = values
        .iter()
        .map(|_| Some(RateLimit::new(10, Unit::Minute)))
        .collect();

    let verdicts = engine.do_limit(&request(&values), &rules).await.unwrap();

    for verdict in &verdicts {
        assert_eq!(verdict.code, VerdictCode::Ok);
        assert_eq!(verdict.limit_remaining, 9);
    }

    // One pipeline per distinct slot touched, all counters written.
    let distinct_slots: std::collections::HashSet<u16> = values
        .iter()
        .map(|v| {
            ratelimit_rs::storage::CounterStore::slot(
                store.as_ref(),
                &format!("edge_api_key_{}_1699999980", v),
            )
        })
        .collect();
    assert_eq!(
        store.stats().pipelines_executed.load(Ordering::Relaxed),
        distinct_slots.len() as u64
    );
    for v in values {
        assert_eq!(store.value(&format!("edge_api_key_{}_1699999980", v)), Some(1));
    }
}

#[tokio::test]
async fn test_stop_increment_policy_spares_far_from_limit_keys() {
    let store = Arc::new(MemoryStore::new());
    let time = MockTime::at(1_700_000_000);
    let mut settings = Settings::default();
    settings.cache.stop_cache_key_increment_when_overlimit = true;
    settings.cache.near_limit_ratio = 0.9;
    let engine = limiter(store.clone(), &settings, time);

    seed(&store, "edge_api_key_A_1699999980", 10).await;
    seed(&store, "edge_api_key_B_1699999980", 95).await;
    seed(&store, "edge_api_key_C_1699999980", 30).await;

    let rules: Vec<_> = (0..3).map(|_| Some(RateLimit::new(100, Unit::Minute))).collect();
    let verdicts = engine
        .do_limit(&request(&["A", "B", "C"]), &rules)
        .await
        .unwrap();

    // Only the near-limit key accrues usage.
    assert_eq!(store.value("edge_api_key_A_1699999980"), Some(10));
    assert_eq!(store.value("edge_api_key_B_1699999980"), Some(96));
    assert_eq!(store.value("edge_api_key_C_1699999980"), Some(30));
    for verdict in &verdicts {
        assert_eq!(verdict.code, VerdictCode::Ok);
    }
}

#[tokio::test]
async fn test_memoized_over_limit_key_short_circuits() {
    let store = Arc::new(MemoryStore::new());
    let time = MockTime::at(1_700_000_000);
    let mut settings = Settings::default();
    settings.cache.local_cache_size_bytes = 64 * 1024;
    let engine = limiter(store.clone(), &settings, time);

    let rules = [Some(RateLimit::new(1, Unit::Minute))];
    let req = request(&["K"]);

    engine.do_limit(&req, &rules).await.unwrap();
    engine.do_limit(&req, &rules).await.unwrap();

    let pipelines_before = store.stats().pipelines_executed.load(Ordering::Relaxed);
    let verdicts = engine.do_limit(&req, &rules).await.unwrap();

    assert_eq!(verdicts[0].code, VerdictCode::OverLimit);
    assert_eq!(verdicts[0].limit_remaining, 0);
    assert_eq!(
        store.stats().pipelines_executed.load(Ordering::Relaxed),
        pipelines_before,
        "memoized over-limit verdict must not touch the store"
    );
}

#[tokio::test]
async fn test_over_limit_persists_across_replicas_via_the_store() {
    // Two engines sharing one store stand in for two limiter replicas.
    let store = Arc::new(MemoryStore::new());
    let time = MockTime::at(1_700_000_000);
    let replica_a = limiter(store.clone(), &Settings::default(), time.clone());
    let replica_b = limiter(store.clone(), &Settings::default(), time);

    let rules = [Some(RateLimit::new(2, Unit::Minute))];
    let req = request(&["K"]);

    replica_a.do_limit(&req, &rules).await.unwrap();
    replica_a.do_limit(&req, &rules).await.unwrap();
    replica_a.do_limit(&req, &rules).await.unwrap();

    // The other replica has no local state yet still sees the exhaustion.
    let verdicts = replica_b.do_limit(&req, &rules).await.unwrap();
    assert_eq!(verdicts[0].code, VerdictCode::OverLimit);
}

#[tokio::test]
async fn test_mixed_matched_and_unmatched_descriptors() {
    let store = Arc::new(MemoryStore::new());
    let time = MockTime::at(1_700_000_000);
    let engine = limiter(store, &Settings::default(), time);

    let rules = [
        Some(RateLimit::new(10, Unit::Minute)),
        None,
        Some(RateLimit::new(10, Unit::Hour).unlimited()),
    ];
    let verdicts = engine
        .do_limit(&request(&["a", "b", "c"]), &rules)
        .await
        .unwrap();

    assert_eq!(verdicts.len(), 3);
    assert_eq!(verdicts[0].limit_remaining, 9);
    assert!(verdicts[1].current_limit.is_none());
    assert!(verdicts[2].current_limit.is_none());
    assert!(verdicts.iter().all(|v| v.allowed()));
}

#[tokio::test]
async fn test_verdicts_align_with_descriptor_order() {
    let store = Arc::new(MemoryStore::new());
    let time = MockTime::at(1_700_000_000);
    let engine = limiter(store, &Settings::default(), time);

    let req = RateLimitRequest::new(
        "edge",
        vec![
            descriptor("first").with_hits_addend(3),
            descriptor("second").with_hits_addend(5),
        ],
    );
    let rules = [
        Some(RateLimit::new(10, Unit::Minute)),
        Some(RateLimit::new(10, Unit::Minute)),
    ];

    let verdicts = engine.do_limit(&req, &rules).await.unwrap();
    assert_eq!(verdicts[0].limit_remaining, 7);
    assert_eq!(verdicts[1].limit_remaining, 5);
}
