//! Fixed-window rate limiting engine
//!
//! Orchestrates a rate-limit check end-to-end: counter key generation,
//! local over-limit short-circuit, optional near-limit pre-read, selective
//! increments (hot keys through the micro-batcher, cold keys through
//! slot-grouped pipelines), and verdict synthesis.

use super::key::{CacheKey, CacheKeyGenerator};
use super::local_cache::OverLimitCache;
use super::types::{RateLimit, RateLimitRequest, Verdict, VerdictCode};
use crate::config::Settings;
use crate::core::hotkey::{HotKeyBatcher, HotKeyDetector};
use crate::storage::{CounterStore, RedisCounterStore, SlotPipelines, StoreOp};
use crate::utils::error::{Error, Result};
use crate::utils::time::{SystemTimeSource, TimeSource};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Distributed fixed-window rate limiter.
///
/// Safe to share behind an `Arc` and re-entrant: every piece of
/// cross-request state is internally synchronized.
pub struct FixedWindowLimiter {
    store: Arc<dyn CounterStore>,
    per_second_store: Option<Arc<dyn CounterStore>>,
    key_gen: CacheKeyGenerator,
    time: Arc<dyn TimeSource>,
    jitter_max_seconds: i64,
    near_limit_ratio: f32,
    stop_increment_when_overlimit: bool,
    local_cache: Option<OverLimitCache>,
    detector: Option<HotKeyDetector>,
    batcher: Option<HotKeyBatcher>,
    per_second_batcher: Option<HotKeyBatcher>,
}

impl FixedWindowLimiter {
    /// Build a limiter over already-connected stores.
    ///
    /// Starts the hot-key batcher workers when hot-key handling is enabled;
    /// call [`close`](Self::close) to stop them.
    pub fn new(
        store: Arc<dyn CounterStore>,
        per_second_store: Option<Arc<dyn CounterStore>>,
        settings: &Settings,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        let cache = &settings.cache;
        let hot_key = &settings.hot_key;

        let (detector, batcher, per_second_batcher) = if hot_key.enabled {
            let flush_window = Duration::from_micros(hot_key.flush_window_micros);

            let batcher = HotKeyBatcher::new(Arc::clone(&store), flush_window);
            batcher.start();

            let per_second_batcher = per_second_store.as_ref().map(|ps| {
                let batcher = HotKeyBatcher::new(Arc::clone(ps), flush_window);
                batcher.start();
                batcher
            });

            warn!(
                "Hot key detection enabled with threshold={}, flush_window={:?}, sketch_memory={} bytes",
                hot_key.threshold, flush_window, hot_key.sketch_memory_bytes
            );

            (
                Some(HotKeyDetector::new(hot_key)),
                Some(batcher),
                per_second_batcher,
            )
        } else {
            (None, None, None)
        };

        Self {
            store,
            per_second_store,
            key_gen: CacheKeyGenerator::new(cache.cache_key_prefix.clone()),
            time,
            jitter_max_seconds: cache.expiration_jitter_max_seconds,
            near_limit_ratio: cache.near_limit_ratio,
            stop_increment_when_overlimit: cache.stop_cache_key_increment_when_overlimit,
            local_cache: OverLimitCache::from_size_bytes(cache.local_cache_size_bytes),
            detector,
            batcher,
            per_second_batcher,
        }
    }

    /// Connect the configured Redis store(s) and build a limiter on the
    /// system clock.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let store: Arc<dyn CounterStore> =
            Arc::new(RedisCounterStore::connect(&settings.store).await?);

        let per_second_store = match &settings.per_second_store {
            Some(config) => {
                let store: Arc<dyn CounterStore> =
                    Arc::new(RedisCounterStore::connect(config).await?);
                Some(store)
            }
            None => None,
        };

        info!("rate limiter connected");
        Ok(Self::new(
            store,
            per_second_store,
            settings,
            Arc::new(SystemTimeSource),
        ))
    }

    /// Stop the hot-key batchers, draining anything still pending.
    pub async fn close(&self) {
        if let Some(batcher) = &self.batcher {
            batcher.stop().await;
        }
        if let Some(batcher) = &self.per_second_batcher {
            batcher.stop().await;
        }
    }

    /// Evaluate every descriptor of `request` against its corresponding
    /// rule and return one verdict per descriptor.
    ///
    /// `rules[i]` applies to `request.descriptors[i]`; `None` means the
    /// descriptor matched no rule. On a store failure no verdicts are
    /// returned; counters may have been partially updated (at-least-once).
    pub async fn do_limit(
        &self,
        request: &RateLimitRequest,
        rules: &[Option<RateLimit>],
    ) -> Result<Vec<Verdict>> {
        debug!("starting cache lookup");

        let n = request.descriptors.len();
        if rules.len() != n {
            return Err(Error::Internal(format!(
                "{} descriptors but {} rules",
                n,
                rules.len()
            )));
        }

        // One clock sample per request keeps every descriptor on a
        // consistent window base.
        let now = self.time.unix_now();

        let hits: Vec<u64> = request.descriptors.iter().map(|d| d.hits()).collect();

        let cache_keys: Vec<CacheKey> = request
            .descriptors
            .iter()
            .zip(rules)
            .map(|(descriptor, rule)| {
                self.key_gen
                    .generate(&request.domain, descriptor, rule.as_ref(), now)
            })
            .collect();

        // Local over-limit short-circuit.
        let mut local_over_limit = vec![false; n];
        let mut any_local_over_limit = false;
        if let Some(cache) = &self.local_cache {
            for (i, cache_key) in cache_keys.iter().enumerate() {
                if cache_key.is_empty() {
                    continue;
                }
                if cache.is_over_limit(&cache_key.key, now) {
                    match &rules[i] {
                        Some(rule) if rule.shadow_mode => debug!(
                            "cache key {} would be rate limited but shadow mode is enabled on this rule",
                            cache_key.key
                        ),
                        _ => debug!("cache key is over the limit: {}", cache_key.key),
                    }
                    local_over_limit[i] = true;
                    any_local_over_limit = true;
                }
            }
        }

        // Near-limit pre-read, only under the selective-increment policy.
        let mut near_limit = vec![false; n];
        let mut any_near_limit = false;
        if self.stop_increment_when_overlimit && !any_local_over_limit {
            let current = self.read_current_counts(&cache_keys).await?;

            for (i, cache_key) in cache_keys.iter().enumerate() {
                if cache_key.is_empty() {
                    continue;
                }
                let rule = match &rules[i] {
                    Some(rule) => rule,
                    None => continue,
                };

                let after = current[i] + hits[i];
                let ratio = rule.near_limit_ratio.unwrap_or(self.near_limit_ratio);
                if after as f64 >= f64::from(rule.limit) * f64::from(ratio) {
                    near_limit[i] = true;
                    any_near_limit = true;
                }
            }
        }

        // Increment phase: hot keys go to the batcher, cold keys into
        // slot-grouped pipelines.
        let mut results = vec![0u64; n];
        let mut main_pipelines = SlotPipelines::new();
        let mut per_second_pipelines = SlotPipelines::new();
        let mut promises: Vec<(usize, oneshot::Receiver<Result<u64>>)> = Vec::new();

        for (i, cache_key) in cache_keys.iter().enumerate() {
            if cache_key.is_empty() || local_over_limit[i] {
                continue;
            }
            let rule = match &rules[i] {
                Some(rule) => rule,
                None => continue,
            };

            debug!("looking up cache key: {}", cache_key.key);

            let mut expiration = rule.unit.seconds();
            if self.jitter_max_seconds > 0 {
                expiration += rand::thread_rng().gen_range(0..self.jitter_max_seconds);
            }

            let effective_hits = self.effective_hits(
                hits[i],
                any_local_over_limit,
                any_near_limit,
                near_limit[i],
            );

            let routed_to_per_second = self.routes_to_per_second(cache_key);
            let batcher = if routed_to_per_second {
                self.per_second_batcher.as_ref()
            } else {
                self.batcher.as_ref()
            };

            let mut batched = false;
            if let (Some(detector), Some(batcher)) = (&self.detector, batcher) {
                if detector.record_access(&cache_key.key) {
                    debug!("hot key detected: {}", cache_key.key);
                    promises.push((
                        i,
                        batcher.submit(&cache_key.key, effective_hits, expiration),
                    ));
                    batched = true;
                }
            }

            if !batched {
                let store = self.routed_store(cache_key);
                let pipelines = if routed_to_per_second {
                    &mut per_second_pipelines
                } else {
                    &mut main_pipelines
                };
                pipelines.push(
                    store.as_ref(),
                    i,
                    StoreOp::IncrBy {
                        key: cache_key.key.clone(),
                        delta: effective_hits,
                    },
                );
                pipelines.push(
                    store.as_ref(),
                    i,
                    StoreOp::Expire {
                        key: cache_key.key.clone(),
                        seconds: expiration,
                    },
                );
            }
        }

        self.execute_routed(main_pipelines, per_second_pipelines, &mut results)
            .await?;

        // Join the batched results.
        for (i, promise) in promises {
            let value = promise
                .await
                .map_err(|_| Error::Internal("batcher dropped a result promise".to_string()))??;
            results[i] = value;
        }

        // Verdict synthesis.
        let mut verdicts = Vec::with_capacity(n);
        for i in 0..n {
            let rule = match &rules[i] {
                Some(rule) if !cache_keys[i].is_empty() => rule,
                _ => {
                    verdicts.push(Verdict::unmatched());
                    continue;
                }
            };

            let window_seconds = rule.unit.seconds();
            let seconds_until_reset = window_seconds - (now % window_seconds);
            let duration_until_reset = Duration::from_secs(seconds_until_reset.max(0) as u64);
            let limit = u64::from(rule.limit);

            let (over_limit, limit_remaining) = if local_over_limit[i] {
                (true, 0)
            } else {
                let after = results[i];
                let before = after.saturating_sub(hits[i]);
                let over = after > limit;

                // First crossing this window: memoize so the next request
                // short-circuits without store I/O.
                if over && before <= limit {
                    if let Some(cache) = &self.local_cache {
                        cache.mark_over_limit(&cache_keys[i].key, now + seconds_until_reset);
                    }
                }

                let remaining = limit.saturating_sub(after).min(u64::from(u32::MAX)) as u32;
                (over, remaining)
            };

            let code = if over_limit && !rule.shadow_mode {
                VerdictCode::OverLimit
            } else {
                VerdictCode::Ok
            };

            verdicts.push(Verdict {
                code,
                current_limit: Some(rule.clone()),
                limit_remaining,
                duration_until_reset,
                shadow_mode: rule.shadow_mode && over_limit,
            });
        }

        Ok(verdicts)
    }

    /// Effective hits under the selective-increment policy.
    ///
    /// With the policy off every key takes its full addend. With it on: an
    /// over-limit key anywhere suppresses all increments; otherwise, when
    /// any key is near limit, only near-limit keys contribute.
    fn effective_hits(
        &self,
        hits: u64,
        any_over_limit: bool,
        any_near_limit: bool,
        is_near_limit: bool,
    ) -> u64 {
        if !self.stop_increment_when_overlimit {
            return hits;
        }
        if any_over_limit {
            return 0;
        }
        if !any_near_limit {
            return hits;
        }
        if is_near_limit {
            hits
        } else {
            0
        }
    }

    fn routes_to_per_second(&self, cache_key: &CacheKey) -> bool {
        cache_key.per_second && self.per_second_store.is_some()
    }

    fn routed_store(&self, cache_key: &CacheKey) -> &Arc<dyn CounterStore> {
        if self.routes_to_per_second(cache_key) {
            self.per_second_store
                .as_ref()
                .unwrap_or(&self.store)
        } else {
            &self.store
        }
    }

    /// Read current counter values for every non-empty key, slot-grouped
    /// per store. Absent keys read as zero.
    async fn read_current_counts(&self, cache_keys: &[CacheKey]) -> Result<Vec<u64>> {
        let mut main_pipelines = SlotPipelines::new();
        let mut per_second_pipelines = SlotPipelines::new();

        for (i, cache_key) in cache_keys.iter().enumerate() {
            if cache_key.is_empty() {
                continue;
            }
            let store = self.routed_store(cache_key);
            let pipelines = if self.routes_to_per_second(cache_key) {
                &mut per_second_pipelines
            } else {
                &mut main_pipelines
            };
            pipelines.push(
                store.as_ref(),
                i,
                StoreOp::Get {
                    key: cache_key.key.clone(),
                },
            );
        }

        let mut current = vec![0u64; cache_keys.len()];
        self.execute_routed(main_pipelines, per_second_pipelines, &mut current)
            .await?;
        Ok(current)
    }

    /// Execute the main-store and per-second-store pipeline sets
    /// concurrently, merging replies into one result array.
    async fn execute_routed(
        &self,
        main_pipelines: SlotPipelines,
        per_second_pipelines: SlotPipelines,
        results: &mut [u64],
    ) -> Result<()> {
        match (&self.per_second_store, per_second_pipelines.is_empty()) {
            (Some(per_second_store), false) => {
                let mut per_second_results = vec![0u64; results.len()];
                let main = main_pipelines.execute(&self.store, results);
                let per_second =
                    per_second_pipelines.execute(per_second_store, &mut per_second_results);
                futures::future::try_join(main, per_second).await?;

                for (merged, value) in results.iter_mut().zip(per_second_results) {
                    if value != 0 {
                        *merged = value;
                    }
                }
                Ok(())
            }
            _ => main_pipelines.execute(&self.store, results).await,
        }
    }

    /// The configured hot-key detector, when enabled.
    pub fn detector(&self) -> Option<&HotKeyDetector> {
        self.detector.as_ref()
    }
}
