//! # Response Cache with Single-Flight
//!
//! A bounded LRU cache with per-entry TTL, fronted by a single-flight table:
//! when several callers miss on the same key at the same time, exactly one
//! computation runs and all of them share its outcome. Failures are never
//! cached, and the computation itself decides whether its successful result
//! is cacheable.
//!
//! The LRU sits behind one mutex; the in-flight table is a sharded
//! `DashMap`, so misses on unrelated keys never contend with each other.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Normalizes a question for cache keying: lowercase, trimmed, inner
/// whitespace collapsed.
pub fn normalize_question(question: &str) -> String {
    question
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A response-cache key: the normalized question plus the retrieval depth.
/// Session ids are deliberately absent; cache hits are shared across
/// sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    question: String,
    k: usize,
}

impl CacheKey {
    pub fn new(question: &str, k: usize) -> Self {
        Self {
            question: normalize_question(question),
            k,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }
}

/// A computed value plus the computation's verdict on whether it may be
/// cached (refusals, for instance, are served but never stored).
#[derive(Debug, Clone)]
pub struct Computed<V> {
    pub value: V,
    pub cacheable: bool,
}

struct CachedEntry<V> {
    value: V,
    stored_at: Instant,
}

type SharedComputation<V, E> = Shared<BoxFuture<'static, Result<Computed<V>, Arc<E>>>>;

/// The cache. `V` is the cached value; `E` the computation error, handed to
/// concurrent callers behind an `Arc` because all of them receive the same
/// failure.
pub struct SingleFlightCache<V, E> {
    ttl: Duration,
    entries: Mutex<LruCache<CacheKey, CachedEntry<V>>>,
    in_flight: DashMap<CacheKey, SharedComputation<V, E>>,
}

impl<V, E> SingleFlightCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: DashMap::new(),
        }
    }

    /// Returns the fresh cached value for `key`, if any. Expired entries are
    /// evicted on the way.
    pub fn lookup(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        if let Some(entry) = entries.get(key) {
            if entry.stored_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
            entries.pop(key);
        }
        None
    }

    /// Returns the cached value or computes it, coalescing concurrent
    /// callers of the same key onto one shared computation. The slot is
    /// cleared on completion either way; failures are not cached.
    pub async fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Computed<V>, E>>,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        let computation = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                let shared = compute().map(|result| result.map_err(Arc::new)).boxed().shared();
                slot.insert(shared.clone());
                shared
            }
        };

        let outcome = computation.clone().await;

        // Clear the slot exactly once; only the computation we awaited is
        // removed, so a newer in-flight entry for the same key survives.
        self.in_flight
            .remove_if(&key, |_, current| current.ptr_eq(&computation));

        match outcome {
            Ok(computed) => {
                if computed.cacheable {
                    let mut entries = self.entries.lock().expect("cache lock poisoned");
                    entries.put(
                        key,
                        CachedEntry {
                            value: computed.value.clone(),
                            stored_at: Instant::now(),
                        },
                    );
                }
                Ok(computed.value)
            }
            Err(err) => Err(err),
        }
    }

    /// Number of stored entries (expired ones included until touched).
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    fn cache(ttl: Duration) -> SingleFlightCache<String, String> {
        SingleFlightCache::new(8, ttl)
    }

    #[test]
    fn normalization_folds_case_and_whitespace() {
        assert_eq!(normalize_question("  What   IS\nthis? "), "what is this?");
        assert_eq!(
            CacheKey::new("What is X?", 8),
            CacheKey::new("  what   is x? ", 8)
        );
        assert_ne!(CacheKey::new("what is x?", 8), CacheKey::new("what is x?", 4));
    }

    #[tokio::test]
    async fn caches_successful_results() {
        let cache = cache(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let value = cache
                .get_or_compute(CacheKey::new("q", 8), move || {
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Computed {
                            value: "answer".to_string(),
                            cacheable: true,
                        })
                    }
                    .boxed()
                })
                .await
                .expect("computation succeeds");
            assert_eq!(value, "answer");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn uncacheable_results_are_served_but_not_stored() {
        let cache = cache(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let value = cache
                .get_or_compute(CacheKey::new("q", 8), move || {
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Computed {
                            value: "refusal".to_string(),
                            cacheable: false,
                        })
                    }
                    .boxed()
                })
                .await
                .expect("computation succeeds");
            assert_eq!(value, "refusal");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = cache(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        for expected in ["first", "second"] {
            let calls = calls.clone();
            let result = cache
                .get_or_compute(CacheKey::new("q", 8), move || {
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        Err(if n == 0 { "first".to_string() } else { "second".to_string() })
                    }
                    .boxed()
                })
                .await;
            assert_eq!(*result.unwrap_err(), expected);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entries_are_recomputed() {
        let cache = cache(Duration::from_millis(20));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let _ = cache
                .get_or_compute(CacheKey::new("q", 8), move || {
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Computed {
                            value: "v".to_string(),
                            cacheable: true,
                        })
                    }
                    .boxed()
                })
                .await;
            tokio::time::sleep(Duration::from_millis(40)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_computation() {
        let cache = Arc::new(cache(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(8));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                cache
                    .get_or_compute(CacheKey::new("q", 8), move || {
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(25)).await;
                            Ok(Computed {
                                value: "shared".to_string(),
                                cacheable: true,
                            })
                        }
                        .boxed()
                    })
                    .await
            }));
        }

        for handle in handles {
            let value = handle.await.expect("task completes").expect("no error");
            assert_eq!(value, "shared");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let cache: SingleFlightCache<String, String> =
            SingleFlightCache::new(2, Duration::from_secs(60));
        for question in ["a", "b", "c"] {
            let _ = cache
                .get_or_compute(CacheKey::new(question, 8), move || {
                    async move {
                        Ok(Computed {
                            value: question.to_string(),
                            cacheable: true,
                        })
                    }
                    .boxed()
                })
                .await;
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(&CacheKey::new("a", 8)).is_none());
        assert_eq!(cache.lookup(&CacheKey::new("c", 8)).as_deref(), Some("c"));
    }
}
