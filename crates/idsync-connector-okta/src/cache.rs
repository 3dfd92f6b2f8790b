//! Connector-lifetime caches.
//!
//! [`RoleFlagCache`] holds administrator role flags per user and is never
//! invalidated. [`ResponseCache`] holds single-resource GET bodies, bounded by
//! an idle timeout (TTI) and a maximum lifetime (TTL).

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::debug;

use idsync_connector::error::ConnectorResult;

use crate::role::AdministratorRoleFlags;

type FlagCell = Arc<OnceCell<Arc<AdministratorRoleFlags>>>;

/// Per-user administrator role flags, shared by every syncer of a connector.
///
/// Each user id owns one cell, so concurrent misses for the same user wait on
/// a single upstream lookup.
#[derive(Debug, Default)]
pub struct RoleFlagCache {
    entries: DashMap<String, FlagCell>,
}

impl RoleFlagCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached flags for `user_id`, if present.
    pub fn get(&self, user_id: &str) -> Option<Arc<AdministratorRoleFlags>> {
        self.entries
            .get(user_id)
            .and_then(|cell| cell.get().cloned())
    }

    /// Return cached flags, or run `fetch` and cache its result.
    ///
    /// # Errors
    ///
    /// Propagates the error from `fetch`; failures are not cached and the
    /// next caller fetches again.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        user_id: &str,
        fetch: F,
    ) -> ConnectorResult<Arc<AdministratorRoleFlags>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ConnectorResult<AdministratorRoleFlags>>,
    {
        let cell = Arc::clone(self.entries.entry(user_id.to_string()).or_default().value());

        let flags = cell
            .get_or_try_init(|| async move {
                debug!(user_id = %user_id, "role flag cache miss");
                fetch().await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(flags))
    }

    /// Number of users with cached flags.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct CachedBody {
    body: String,
    inserted_at: Instant,
    accessed_at: Instant,
}

/// Cache of GET response bodies keyed by request URL.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<String, CachedBody>,
    tti: Duration,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(tti: Duration, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            tti,
            ttl,
        }
    }

    /// Fresh body for `key`. Expired entries are evicted.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entry = self.entries.get_mut(key)?;

        let expired = now.duration_since(entry.inserted_at) >= self.ttl
            || now.duration_since(entry.accessed_at) >= self.tti;
        if expired {
            drop(entry);
            self.entries.remove(key);
            return None;
        }

        entry.accessed_at = now;
        Some(entry.body.clone())
    }

    pub fn insert(&self, key: impl Into<String>, body: impl Into<String>) {
        let now = Instant::now();
        self.entries.insert(
            key.into(),
            CachedBody {
                body: body.into(),
                inserted_at: now,
                accessed_at: now,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_role_flags_fetched_once() {
        let cache = RoleFlagCache::new();
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let flags = cache
                .get_or_fetch("00u1", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(AdministratorRoleFlags::empty("00u1"))
                })
                .await
                .unwrap();
            assert_eq!(flags.user_id, "00u1");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_fetch_once() {
        let cache = Arc::new(RoleFlagCache::new());
        let calls = Arc::new(AtomicU32::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_fetch("00u1", || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(AdministratorRoleFlags::empty("00u1"))
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            let flags = task.await.unwrap().unwrap();
            assert_eq!(flags.user_id, "00u1");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_role_flag_fetch_errors_not_cached() {
        let cache = RoleFlagCache::new();
        let result = cache
            .get_or_fetch("00u1", || async {
                Err(idsync_connector::error::ConnectorError::validation("boom"))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_response_cache_hit() {
        let cache = ResponseCache::new(Duration::from_secs(60), Duration::from_secs(300));
        cache.insert("https://acme.okta.com/api/v1/groups/00g1", "{}");
        assert_eq!(
            cache.get("https://acme.okta.com/api/v1/groups/00g1").as_deref(),
            Some("{}")
        );
        assert!(cache.get("https://acme.okta.com/api/v1/groups/00g2").is_none());
    }

    #[test]
    fn test_response_cache_expiry() {
        let cache = ResponseCache::new(Duration::from_secs(60), Duration::ZERO);
        cache.insert("k", "v");
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_response_cache_invalidate() {
        let cache = ResponseCache::new(Duration::from_secs(60), Duration::from_secs(300));
        cache.insert("k", "v");
        cache.invalidate("k");
        assert!(cache.get("k").is_none());
    }
}
