//! Single-flight cache core shared by every cache in the crate.
//!
//! A lookup takes the state lock only long enough to check the stored
//! entries and the in-flight table. On a miss the computation is spawned as
//! its own task and published as a shared future, so concurrent callers for
//! the same key await one result while unrelated keys compute in parallel.
//! A caller that gives up does not cancel the task; the result still lands
//! in the cache.
//!
//! Failures are handed to every waiter of that flight and are not stored.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

type Flight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// Counters and sizes of one cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightStats {
    pub entries: usize,
    /// `None` for unbounded caches.
    pub capacity: Option<usize>,
    /// Served from stored entries.
    pub hits: u64,
    /// Started a computation.
    pub misses: u64,
    /// Joined a computation already in flight.
    pub coalesced: u64,
    pub evictions: u64,
    pub in_flight: usize,
}

impl FlightStats {
    /// Hit rate as a percentage (0-100), counting coalesced waiters as hits.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.coalesced;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            (served as f64 / total as f64) * 100.0
        }
    }
}

/// How a lookup was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// A stored entry.
    Hit,
    /// Awaited a computation another caller started.
    Joined,
    /// Started the computation.
    Computed,
}

struct State<K: Hash + Eq, V, E> {
    entries: LruCache<K, V>,
    in_flight: HashMap<K, (u64, Flight<V, E>)>,
    next_flight: u64,
}

struct Inner<K: Hash + Eq, V, E> {
    state: Mutex<State<K, V, E>>,
    capacity: Option<usize>,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V, E> Inner<K, V, E>
where
    K: Hash + Eq + Clone,
{
    /// Retire a flight. Stores the value unless the cache was cleared since.
    fn finish(&self, key: &K, id: u64, result: &Result<V, E>)
    where
        V: Clone,
    {
        let mut state = self.state.lock();
        let current = matches!(state.in_flight.get(key), Some((fid, _)) if *fid == id);
        if !current {
            return;
        }
        state.in_flight.remove(key);
        if let Ok(value) = result {
            if let Some((evicted, _)) = state.entries.push(key.clone(), value.clone()) {
                if evicted != *key {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }
}

/// Keyed cache with at-most-one computation per key.
pub struct FlightCache<K: Hash + Eq, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K: Hash + Eq, V, E> Clone for FlightCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E> FlightCache<K, V, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<tokio::task::JoinError> + 'static,
{
    /// A cache that evicts the least recently used entry beyond `capacity`.
    pub fn bounded(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self::with_entries(LruCache::new(cap), Some(cap.get()))
    }

    /// A cache that never evicts.
    pub fn unbounded() -> Self {
        Self::with_entries(LruCache::unbounded(), None)
    }

    fn with_entries(entries: LruCache<K, V>, capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    entries,
                    in_flight: HashMap::new(),
                    next_flight: 0,
                }),
                capacity,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                coalesced: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
        }
    }

    /// Return the cached value or compute it once.
    ///
    /// `init` is only called by the caller that starts the flight; the
    /// future it returns runs on its own task.
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        self.get_or_try_insert_tracked(key, init).await.0
    }

    /// Like [`FlightCache::get_or_try_insert_with`], also reporting how the
    /// lookup was served.
    pub async fn get_or_try_insert_tracked<F, Fut>(&self, key: K, init: F) -> (Result<V, E>, Lookup)
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (flight, lookup) = {
            let mut state = self.inner.state.lock();

            if let Some(value) = state.entries.get(&key) {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                return (Ok(value.clone()), Lookup::Hit);
            }

            let joined = state.in_flight.get(&key).map(|(_, flight)| flight.clone());
            if let Some(flight) = joined {
                self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
                (flight, Lookup::Joined)
            } else {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                let id = state.next_flight;
                state.next_flight += 1;

                let inner = Arc::clone(&self.inner);
                let task_key = key.clone();
                let compute = init();
                let task = tokio::spawn(async move {
                    let result = compute.await;
                    inner.finish(&task_key, id, &result);
                    result
                });

                let inner = Arc::clone(&self.inner);
                let join_key = key.clone();
                let flight: Flight<V, E> = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(join_err) => {
                            let result = Err(E::from(join_err));
                            inner.finish(&join_key, id, &result);
                            result
                        }
                    }
                }
                .boxed()
                .shared();

                state.in_flight.insert(key, (id, flight.clone()));
                (flight, Lookup::Computed)
            }
        };

        (flight.await, lookup)
    }

    /// Whether a value is stored for `key`. Does not touch recency or counters.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.state.lock().entries.contains(key)
    }

    /// Stored value without computing. Does not touch recency or counters.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner.state.lock().entries.peek(key).cloned()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    /// Drop every entry, forget in-flight computations and reset counters.
    ///
    /// Returns the removed values. Computations still running finish but
    /// are not stored.
    pub fn clear(&self) -> Vec<V> {
        self.drain().0
    }

    /// Like [`FlightCache::clear`], also handing back the computations that
    /// were still running so the caller can dispose of their results.
    pub fn drain(&self) -> (Vec<V>, Vec<BoxFuture<'static, Result<V, E>>>) {
        let mut state = self.inner.state.lock();
        let mut removed = Vec::with_capacity(state.entries.len());
        while let Some((_, value)) = state.entries.pop_lru() {
            removed.push(value);
        }
        let pending = state
            .in_flight
            .drain()
            .map(|(_, (_, flight))| flight.boxed())
            .collect();
        self.inner.hits.store(0, Ordering::Relaxed);
        self.inner.misses.store(0, Ordering::Relaxed);
        self.inner.coalesced.store(0, Ordering::Relaxed);
        self.inner.evictions.store(0, Ordering::Relaxed);
        (removed, pending)
    }

    pub fn stats(&self) -> FlightStats {
        let state = self.inner.state.lock();
        FlightStats {
            entries: state.entries.len(),
            capacity: self.inner.capacity,
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            coalesced: self.inner.coalesced.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            in_flight: state.in_flight.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct TestError(String);

    impl From<tokio::task::JoinError> for TestError {
        fn from(err: tokio::task::JoinError) -> Self {
            TestError(err.to_string())
        }
    }

    type TestCache = FlightCache<u32, u32, TestError>;

    #[tokio::test]
    async fn test_hit_after_miss() {
        let cache = TestCache::bounded(4);
        let v = cache
            .get_or_try_insert_with(1, || async { Ok(10) })
            .await
            .unwrap();
        assert_eq!(v, 10);

        let v = cache
            .get_or_try_insert_with(1, || async { Ok(99) })
            .await
            .unwrap();
        assert_eq!(v, 10);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);

        let (_, lookup) = cache
            .get_or_try_insert_tracked(2, || async { Ok(20) })
            .await;
        assert_eq!(lookup, Lookup::Computed);
        let (_, lookup) = cache
            .get_or_try_insert_tracked(2, || async { Ok(20) })
            .await;
        assert_eq!(lookup, Lookup::Hit);
    }

    #[tokio::test]
    async fn test_failure_not_stored() {
        let cache = TestCache::unbounded();
        let err = cache
            .get_or_try_insert_with(7, || async { Err(TestError("boom".into())) })
            .await;
        assert_eq!(err, Err(TestError("boom".into())));
        assert!(!cache.contains(&7));

        let v = cache
            .get_or_try_insert_with(7, || async { Ok(3) })
            .await
            .unwrap();
        assert_eq!(v, 3);
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = TestCache::bounded(2);
        for k in 0..3 {
            cache
                .get_or_try_insert_with(k, move || async move { Ok(k * 10) })
                .await
                .unwrap();
        }
        assert!(!cache.contains(&0));
        assert!(cache.contains(&1));
        assert!(cache.contains(&2));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_computation() {
        let cache = TestCache::bounded(8);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_insert_with(5, move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(42)
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits + stats.coalesced, 15);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn test_abandoned_caller_still_populates() {
        let cache = TestCache::bounded(2);
        let attempt = tokio::time::timeout(
            Duration::from_millis(5),
            cache.get_or_try_insert_with(1, || async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(11)
            }),
        )
        .await;
        assert!(attempt.is_err());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.peek(&1), Some(11));
    }

    #[tokio::test]
    async fn test_clear_resets_counters() {
        let cache = TestCache::bounded(2);
        cache
            .get_or_try_insert_with(1, || async { Ok(1) })
            .await
            .unwrap();
        cache
            .get_or_try_insert_with(1, || async { Ok(1) })
            .await
            .unwrap();

        let removed = cache.clear();
        assert_eq!(removed, vec![1]);
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), FlightStats {
            capacity: Some(2),
            ..FlightStats::default()
        });
    }
}
