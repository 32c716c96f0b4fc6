//! Metadata cache (spec §4.6): per-`(adapter, entity-kind, entity-key)` TTL
//! cache with a shorter negative TTL for 404s, LRU eviction, and
//! single-flight coalescing of concurrent misses for the same key.
//!
//! Single-flight is a `dashmap`-keyed map of in-flight slots rather than one
//! global lock, per spec §9's "avoid global locks around the whole cache"
//! re-architecture note; LRU bookkeeping lives behind its own lock, tuned
//! for the store's expected contention separately from the single-flight
//! coordination point.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::fetcher::UpstreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKeyKind {
    Resource,
    Version,
}

/// `(adapter, entity-kind, entity-key)` cache key, a real typed value
/// rather than a stringly-typed tuple (spec §9 / §3 SUPPLEMENT).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub adapter: &'static str,
    pub kind: EntityKeyKind,
    /// Resource id, or `resource-id\x1fversion-id` for a Version key.
    pub key: String,
}

impl CacheKey {
    pub fn resource(adapter: &'static str, resource_id: &str) -> Self {
        CacheKey {
            adapter,
            kind: EntityKeyKind::Resource,
            key: resource_id.to_string(),
        }
    }

    pub fn version(adapter: &'static str, resource_id: &str, version_id: &str) -> Self {
        CacheKey {
            adapter,
            kind: EntityKeyKind::Version,
            key: format!("{resource_id}\u{1f}{version_id}"),
        }
    }
}

#[derive(Debug, Clone)]
enum Slot<T> {
    Positive { value: T, fetched_at: Instant },
    Negative { fetched_at: Instant },
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub positive_ttl: Duration,
    pub negative_ttl: Duration,
    /// Stale-but-served grace window after TTL expiry; zero disables grace
    /// (spec §4.6 default).
    pub grace_ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            positive_ttl: Duration::from_secs(15 * 60),
            negative_ttl: Duration::from_secs(60),
            grace_ttl: Duration::ZERO,
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub negative_hits: u64,
}

struct Inner<T: Clone + Send + Sync + 'static> {
    config: CacheConfig,
    lru_order: std::sync::Mutex<LruCache<CacheKey, ()>>,
    slots: DashMap<CacheKey, Slot<T>>,
    inflight: DashMap<CacheKey, Arc<Mutex<()>>>,
    metrics: std::sync::Mutex<CacheMetrics>,
}

/// Process-local metadata cache, one instance per adapter.
#[derive(Clone)]
pub struct MetadataCache<T: Clone + Send + Sync + 'static>(Arc<Inner<T>>);

impl<T: Clone + Send + Sync + 'static> MetadataCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        let cap = std::num::NonZeroUsize::new(config.max_entries.max(1)).unwrap();
        MetadataCache(Arc::new(Inner {
            config,
            lru_order: std::sync::Mutex::new(LruCache::new(cap)),
            slots: DashMap::new(),
            inflight: DashMap::new(),
            metrics: std::sync::Mutex::new(CacheMetrics::default()),
        }))
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.0.metrics.lock().unwrap().clone()
    }

    /// Fetch `key`, calling `fetch` on a cache miss. Concurrent misses for
    /// the same key coalesce onto one `fetch` invocation (single-flight);
    /// the cache never serves data past `positive_ttl + grace_ttl` silently.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: CacheKey,
        fetch: F,
    ) -> Result<T, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        if let Some(hit) = self.lookup(&key) {
            return hit;
        }

        let lock = self
            .0
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-check: the in-flight fetch that held the lock before us may
        // already have populated the slot.
        if let Some(hit) = self.lookup(&key) {
            self.0.inflight.remove(&key);
            return hit;
        }

        self.record_miss();
        let result = fetch().await;
        match &result {
            Ok(value) => self.insert_positive(key.clone(), value.clone()),
            Err(err) if err.is_not_found() => self.insert_negative(key.clone()),
            Err(_) => {
                // Transient errors are never cached (spec §4.6).
            }
        }
        self.0.inflight.remove(&key);
        result
    }

    fn lookup(&self, key: &CacheKey) -> Option<Result<T, UpstreamError>> {
        let slot = self.0.slots.get(key)?;
        let now = Instant::now();
        match &*slot {
            Slot::Positive { value, fetched_at } => {
                let age = now.duration_since(*fetched_at);
                if age <= self.0.config.positive_ttl {
                    self.record_hit();
                    trace!(adapter = key.adapter, "metadata cache hit");
                    Some(Ok(value.clone()))
                } else if age <= self.0.config.positive_ttl + self.0.config.grace_ttl {
                    debug!(adapter = key.adapter, "serving grace-stale metadata cache entry");
                    Some(Ok(value.clone()))
                } else {
                    None
                }
            }
            Slot::Negative { fetched_at } => {
                if now.duration_since(*fetched_at) <= self.0.config.negative_ttl {
                    self.record_negative_hit();
                    Some(Err(UpstreamError::Http {
                        status: 404,
                        body: String::new(),
                    }))
                } else {
                    None
                }
            }
        }
    }

    fn insert_positive(&self, key: CacheKey, value: T) {
        self.0.slots.insert(
            key.clone(),
            Slot::Positive {
                value,
                fetched_at: Instant::now(),
            },
        );
        self.touch_lru(key);
    }

    fn insert_negative(&self, key: CacheKey) {
        self.0.slots.insert(
            key.clone(),
            Slot::Negative {
                fetched_at: Instant::now(),
            },
        );
        self.touch_lru(key);
    }

    fn touch_lru(&self, key: CacheKey) {
        let mut order = self.0.lru_order.lock().unwrap();
        if let Some((evicted_key, _)) = order.push(key.clone(), ()) {
            if evicted_key != key {
                drop(order);
                self.0.slots.remove(&evicted_key);
                self.record_eviction();
            }
        }
    }

    fn record_hit(&self) {
        self.0.metrics.lock().unwrap().hits += 1;
    }
    fn record_negative_hit(&self) {
        self.0.metrics.lock().unwrap().negative_hits += 1;
    }
    fn record_miss(&self) {
        self.0.metrics.lock().unwrap().misses += 1;
    }
    fn record_eviction(&self) {
        self.0.metrics.lock().unwrap().evictions += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn caches_positive_result() {
        let cache: MetadataCache<String> = MetadataCache::new(CacheConfig::default());
        let calls = Arc::new(AtomicU32::new(0));
        let key = CacheKey::resource("node", "express");

        for _ in 0..3 {
            let calls = calls.clone();
            let value = cache
                .get_or_fetch(key.clone(), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("express@4.18.2".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "express@4.18.2");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn negative_caches_only_404() {
        let cache: MetadataCache<String> = MetadataCache::new(CacheConfig::default());
        let key = CacheKey::resource("node", "left-pad-9000");
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let err = cache
                .get_or_fetch(key.clone(), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(UpstreamError::Http {
                        status: 404,
                        body: String::new(),
                    })
                })
                .await
                .unwrap_err();
            assert!(err.is_not_found());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_errors_are_never_cached() {
        let cache: MetadataCache<String> = MetadataCache::new(CacheConfig::default());
        let key = CacheKey::resource("node", "flaky");
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let _ = cache
                .get_or_fetch(key.clone(), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(UpstreamError::Network("connection reset".into()))
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_single_flight() {
        let cache: MetadataCache<String> = MetadataCache::new(CacheConfig::default());
        let calls = Arc::new(AtomicU32::new(0));
        let key = CacheKey::resource("node", "express");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch(key, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok("express@4.18.2".to_string())
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
