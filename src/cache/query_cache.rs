use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use backon::Retryable;
use futures::FutureExt;

use crate::cache::entry::{AnyValue, CacheEntry, QuerySnapshot, QueryStatus};
use crate::cache::key::{CacheKey, ResourceKind};
use crate::cache::policy::QueryPolicy;
use crate::error::{Error, Result};

/// Keyed request cache with in-flight deduplication, staleness windows and
/// per-key retries.
///
/// Cloning is cheap and every clone shares the same entries. Separate
/// `QueryCache::new()` instances share nothing.
#[derive(Clone, Default)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    next_generation: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves `key`, fetching through `loader` only when there is neither a
    /// fresh value nor a request already in flight for it.
    ///
    /// Keys with a blank parameter stay `Idle` and never call the loader.
    /// The returned snapshot is always terminal (`Resolved` or `Failed`)
    /// unless the key was idle.
    pub async fn resolve<T, F, Fut>(&self, key: CacheKey, policy: &QueryPolicy, loader: F) -> QuerySnapshot<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if !key.is_complete() {
            tracing::debug!("Skipping {}: parameters not yet known", key);
            return QuerySnapshot::idle();
        }

        let in_flight = {
            let mut entries = self.lock();
            let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::new);

            if let Some(in_flight) = &entry.in_flight {
                tracing::debug!("Joining in-flight request for {}", key);
                in_flight.clone()
            } else if entry.is_fresh(policy) {
                tracing::debug!("Cache hit for {}", key);
                return entry.snapshot(&key);
            } else {
                let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
                let fetch = self
                    .fetch_with_retry(key.clone(), generation, policy.clone(), loader)
                    .boxed()
                    .shared();

                entry.status = QueryStatus::Pending;
                entry.generation = generation;
                entry.in_flight = Some(fetch.clone());

                // Drive the request to completion even if every caller
                // stops waiting for it.
                tokio::spawn(fetch.clone());
                fetch
            }
        };

        match in_flight.await {
            Ok(value) => match value.downcast::<T>() {
                Ok(data) => QuerySnapshot::resolved(data),
                Err(_) => QuerySnapshot::failed(Error::CacheType(key)),
            },
            Err(error) => QuerySnapshot::failed(error),
        }
    }

    fn fetch_with_retry<T, F, Fut>(
        &self,
        key: CacheKey,
        generation: u64,
        policy: QueryPolicy,
        loader: F,
    ) -> impl Future<Output = Result<AnyValue>> + Send + 'static
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let cache = self.clone();
        async move {
            let mut retries = 0u32;
            let result = (|| loader())
                .retry(policy.backoff())
                .sleep(tokio::time::sleep)
                .when(|e: &Error| e.is_retryable())
                .notify(|e: &Error, delay: Duration| {
                    retries += 1;
                    tracing::warn!("Request for {} failed ({}), retrying in {:?}", key, e, delay);
                })
                .await
                .map(|value| Arc::new(value) as AnyValue);

            cache.settle(&key, generation, &result, retries);
            result
        }
    }

    /// Records the terminal state of a fetch. Results for entries that were
    /// removed, or superseded by a newer fetch, are dropped.
    fn settle(&self, key: &CacheKey, generation: u64, result: &Result<AnyValue>, retries: u32) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            tracing::debug!("Discarding result for removed entry {}", key);
            return;
        };
        if entry.generation != generation {
            tracing::debug!("Discarding superseded result for {}", key);
            return;
        }

        entry.in_flight = None;
        entry.retry_count = retries;
        entry.invalidated = entry.invalidated_during == generation;

        match result {
            Ok(value) => {
                entry.status = QueryStatus::Resolved;
                entry.value = Some(Arc::clone(value));
                entry.error = None;
                entry.fetched_at = Some(Instant::now());
                entry.version = generation;
            }
            Err(error) => {
                tracing::warn!("Request for {} failed after {} retries: {}", key, retries, error);
                entry.status = QueryStatus::Failed;
                entry.error = Some(error.clone());
            }
        }
    }

    /// Synchronous read of the current state for `key`.
    pub fn snapshot<T: Send + Sync + 'static>(&self, key: &CacheKey) -> QuerySnapshot<T> {
        self.lock()
            .get(key)
            .map(|entry| entry.snapshot(key))
            .unwrap_or_else(QuerySnapshot::idle)
    }

    pub fn status(&self, key: &CacheKey) -> QueryStatus {
        self.lock()
            .get(key)
            .map(|entry| entry.status)
            .unwrap_or(QueryStatus::Idle)
    }

    /// Identifies the value currently held for `key`; changes whenever a
    /// fetch for it succeeds.
    pub fn version(&self, key: &CacheKey) -> Option<u64> {
        self.lock()
            .get(key)
            .filter(|entry| entry.value.is_some())
            .map(|entry| entry.version)
    }

    pub fn retry_count(&self, key: &CacheKey) -> u32 {
        self.lock().get(key).map(|entry| entry.retry_count).unwrap_or(0)
    }

    /// Marks `key` stale; the next access refetches.
    pub fn invalidate(&self, key: &CacheKey) {
        if let Some(entry) = self.lock().get_mut(key) {
            entry.mark_stale();
        }
    }

    pub fn invalidate_kind(&self, kind: ResourceKind) {
        self.invalidate_where(|key| key.kind() == kind);
    }

    pub fn invalidate_where(&self, predicate: impl Fn(&CacheKey) -> bool) {
        let mut entries = self.lock();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if predicate(key) {
                entry.mark_stale();
                count += 1;
            }
        }
        tracing::debug!("Invalidated {} cache entries", count);
    }

    /// Drops `key`. A request still in flight for it settles into nothing.
    pub fn remove(&self, key: &CacheKey) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::testing::api_error;
    use std::sync::atomic::AtomicUsize;

    fn immediate(retry: u32, stale_time: Option<Duration>) -> QueryPolicy {
        QueryPolicy {
            stale_time,
            retry,
            retry_delay: Duration::ZERO,
            max_retry_delay: Duration::ZERO,
        }
    }

    fn counting_loader(
        calls: &Arc<AtomicUsize>,
        delay: Duration,
    ) -> impl Fn() -> futures::future::BoxFuture<'static, Result<String>> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(delay).await;
                Ok(format!("value-{}", n))
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_resolves_and_caches_within_window() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = immediate(0, Some(Duration::from_secs(60)));
        let key = CacheKey::user("octocat");

        let first = cache
            .resolve(key.clone(), &policy, counting_loader(&calls, Duration::ZERO))
            .await;
        let second = cache
            .resolve(key.clone(), &policy, counting_loader(&calls, Duration::ZERO))
            .await;

        assert!(first.is_resolved());
        assert_eq!(second.data.as_deref().map(String::as_str), Some("value-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.status(&key), QueryStatus::Resolved);
    }

    #[tokio::test]
    async fn test_without_window_refetches() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = immediate(0, None);
        let key = CacheKey::languages("octocat", "A");

        cache.resolve(key.clone(), &policy, counting_loader(&calls, Duration::ZERO)).await;
        let second = cache
            .resolve(key.clone(), &policy, counting_loader(&calls, Duration::ZERO))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.data.as_deref().map(String::as_str), Some("value-2"));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_request() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = immediate(0, None);
        let key = CacheKey::repos("octocat");

        let resolutions = (0..5).map(|_| {
            cache.resolve(
                key.clone(),
                &policy,
                counting_loader(&calls, Duration::from_millis(20)),
            )
        });
        let snapshots = futures::future::join_all(resolutions).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for snapshot in snapshots {
            assert_eq!(snapshot.data.as_deref().map(String::as_str), Some("value-1"));
        }
    }

    #[tokio::test]
    async fn test_pending_while_in_flight() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = immediate(0, None);
        let key = CacheKey::user("octocat");

        let background = {
            let cache = cache.clone();
            let key = key.clone();
            let loader = counting_loader(&calls, Duration::from_millis(50));
            tokio::spawn(async move { cache.resolve(key, &policy, loader).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshot = cache.snapshot::<String>(&key);
        assert!(snapshot.is_loading());
        assert!(snapshot.data.is_none());
        assert!(snapshot.error.is_none());

        assert!(background.await.unwrap().is_resolved());
        assert!(!cache.snapshot::<String>(&key).is_loading());
    }

    #[tokio::test]
    async fn test_retries_up_to_bound_then_fails() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::user("ghost");

        let loader = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<String, _>(api_error(404, "Not Found"))
                }
            }
        };
        let snapshot = cache.resolve(key.clone(), &immediate(2, None), loader).await;

        assert!(snapshot.is_failed());
        assert_eq!(snapshot.error.as_ref().map(Error::status), Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.retry_count(&key), 2);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let loader = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(Error::Transport {
                            message: "reset by peer".to_string(),
                        })
                    } else {
                        Ok(42u64)
                    }
                }
            }
        };
        let snapshot = cache
            .resolve(CacheKey::user("octocat"), &immediate(2, None), loader)
            .await;

        assert_eq!(snapshot.data.as_deref(), Some(&42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_entry_refetches_on_next_access() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::user("octocat");
        let policy = immediate(0, Some(Duration::from_secs(60)));

        let loader = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    match calls.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(api_error(500, "Server Error")),
                        _ => Ok("ok".to_string()),
                    }
                }
            }
        };

        let failed = cache.resolve(key.clone(), &policy, loader.clone()).await;
        assert!(failed.is_failed());
        assert_eq!(cache.status(&key), QueryStatus::Failed);

        let recovered = cache.resolve(key.clone(), &policy, loader).await;
        assert!(recovered.is_resolved());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retries_are_per_key() {
        let cache = QueryCache::new();
        let failing_calls = Arc::new(AtomicUsize::new(0));
        let sibling_calls = Arc::new(AtomicUsize::new(0));
        let policy = immediate(2, None);

        let failing = {
            let calls = Arc::clone(&failing_calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<String, _>(api_error(500, "boom"))
                }
            }
        };

        let (failed, ok) = tokio::join!(
            cache.resolve(CacheKey::languages("octocat", "A"), &policy, failing),
            cache.resolve(
                CacheKey::languages("octocat", "B"),
                &policy,
                counting_loader(&sibling_calls, Duration::ZERO)
            ),
        );

        assert!(failed.is_failed());
        assert!(ok.is_resolved());
        assert_eq!(failing_calls.load(Ordering::SeqCst), 3);
        assert_eq!(sibling_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_incomplete_key_stays_idle() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::languages("octocat", "");

        let snapshot = cache
            .resolve(key.clone(), &immediate(0, None), counting_loader(&calls, Duration::ZERO))
            .await;

        assert!(snapshot.is_idle());
        assert!(snapshot.data.is_none() && snapshot.error.is_none());
        assert!(!snapshot.is_loading());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = immediate(0, Some(Duration::from_secs(60)));
        let key = CacheKey::user("octocat");

        cache.resolve(key.clone(), &policy, counting_loader(&calls, Duration::ZERO)).await;
        let first_version = cache.version(&key);
        cache.invalidate_kind(ResourceKind::User);
        let snapshot = cache
            .resolve(key.clone(), &policy, counting_loader(&calls, Duration::ZERO))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(snapshot.data.as_deref().map(String::as_str), Some("value-2"));
        assert_ne!(cache.version(&key), first_version);
    }

    #[tokio::test]
    async fn test_invalidate_while_in_flight_forces_refetch() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = immediate(0, Some(Duration::from_secs(300)));
        let key = CacheKey::user("octocat");

        let background = {
            let cache = cache.clone();
            let key = key.clone();
            let policy = policy.clone();
            let loader = counting_loader(&calls, Duration::from_millis(40));
            tokio::spawn(async move { cache.resolve(key, &policy, loader).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.invalidate(&key);

        let first = background.await.unwrap();
        assert_eq!(first.data.as_deref().map(String::as_str), Some("value-1"));

        let second = cache
            .resolve(key.clone(), &policy, counting_loader(&calls, Duration::ZERO))
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(second.data.as_deref().map(String::as_str), Some("value-2"));

        // The refetch clears the mark.
        cache.resolve(key.clone(), &policy, counting_loader(&calls, Duration::ZERO)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_removed_entry_ignores_late_result() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::languages("octocat", "A");

        let background = {
            let cache = cache.clone();
            let key = key.clone();
            let loader = counting_loader(&calls, Duration::from_millis(30));
            tokio::spawn(async move { cache.resolve(key, &immediate(0, None), loader).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.clear();

        // The first caller still sees its own terminal result.
        assert!(background.await.unwrap().is_resolved());
        assert!(cache.snapshot::<String>(&key).is_idle());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_reported() {
        let cache = QueryCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::user("octocat");
        let policy = immediate(0, Some(Duration::from_secs(60)));

        cache.resolve(key.clone(), &policy, counting_loader(&calls, Duration::ZERO)).await;
        let snapshot = cache.snapshot::<u64>(&key);

        assert!(matches!(snapshot.error, Some(Error::CacheType(_))));
    }
}
