//! Content cache: text of opened notes, validated by freshness tag.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::CachedContent;
use crate::remote::{RemoteError, RemoteSource};
use crate::store::Store;

pub struct ContentCache<R: RemoteSource> {
    store: Arc<Store>,
    remote: Arc<R>,
}

impl<R: RemoteSource> ContentCache<R> {
    pub fn new(store: Arc<Store>, remote: Arc<R>) -> Self {
        Self { store, remote }
    }

    /// Return a note's content, fetching it when the cache can't answer.
    ///
    /// A cached entry is served without a network call when `known_tag` is
    /// None or equals the cached tag. On a mismatch or a miss the remote is
    /// asked first. If that fetch fails with a network or credential error
    /// and an entry is cached, the cached content is returned instead.
    pub async fn get_or_fetch(&self, remote_id: &str, known_tag: Option<&str>) -> Result<String> {
        let cached = self.store.content.get(remote_id).await;

        if let Some(entry) = &cached {
            if known_tag.is_none_or(|tag| entry.freshness_tag.as_deref() == Some(tag)) {
                debug!(remote_id, "Content cache hit");
                return Ok(entry.content.clone());
            }
        }

        debug!(remote_id, "Content cache miss, fetching");
        let freshness_tag = known_tag
            .map(str::to_string)
            .or_else(|| cached.as_ref().and_then(|entry| entry.freshness_tag.clone()));

        // Runs detached so a caller that stops waiting doesn't cancel the cache write
        let fetch = tokio::spawn(fetch_and_store(
            self.store.clone(),
            self.remote.clone(),
            remote_id.to_string(),
            freshness_tag,
        ));
        let fetched = fetch
            .await
            .unwrap_or_else(|e| Err(RemoteError::Transient(format!("fetch task failed: {}", e))));

        match (fetched, cached) {
            (Ok(content), _) => Ok(content),
            (Err(e), Some(entry)) if e.allows_stale_fallback() => {
                warn!(remote_id, "Fetch failed, serving cached content: {}", e);
                Ok(entry.content)
            }
            (Err(e), _) => Err(e.into()),
        }
    }

    pub async fn get_cached(&self, remote_id: &str) -> Option<CachedContent> {
        self.store.content.get(remote_id).await
    }

    pub async fn is_cached(&self, remote_id: &str) -> bool {
        self.store.content.get(remote_id).await.is_some()
    }

    /// Drop every cached note.
    pub async fn clear(&self) -> Result<()> {
        self.store.content.clear().await?;
        Ok(())
    }
}

async fn fetch_and_store<R: RemoteSource>(
    store: Arc<Store>,
    remote: Arc<R>,
    remote_id: String,
    freshness_tag: Option<String>,
) -> std::result::Result<String, RemoteError> {
    let content = remote.fetch_content(&remote_id).await?;

    let entry = CachedContent {
        remote_id: remote_id.clone(),
        content: content.clone(),
        freshness_tag,
        last_synced_at: Utc::now(),
    };
    if let Err(e) = store.content.put(entry).await {
        warn!(remote_id = %remote_id, "Failed to cache fetched content: {}", e);
    }

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::error::CacheError;
    use crate::remote::{InMemoryRemote, ListPage, ListRequest, RemoteItem};

    /// Holds every content download until the test releases it.
    struct GatedRemote {
        inner: InMemoryRemote,
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RemoteSource for GatedRemote {
        async fn list(&self, request: ListRequest) -> std::result::Result<ListPage, RemoteError> {
            self.inner.list(request).await
        }

        async fn fetch_content(&self, remote_id: &str) -> std::result::Result<String, RemoteError> {
            self.started.notify_one();
            self.release.notified().await;
            self.inner.fetch_content(remote_id).await
        }

        async fn fetch_bytes(&self, remote_id: &str) -> std::result::Result<Vec<u8>, RemoteError> {
            self.inner.fetch_bytes(remote_id).await
        }

        async fn get_item(&self, remote_id: &str) -> std::result::Result<RemoteItem, RemoteError> {
            self.inner.get_item(remote_id).await
        }

        async fn fetch_by_path(&self, path: &str) -> std::result::Result<RemoteItem, RemoteError> {
            self.inner.fetch_by_path(path).await
        }
    }

    fn setup() -> (Arc<Store>, Arc<InMemoryRemote>, ContentCache<InMemoryRemote>) {
        let store = Arc::new(Store::in_memory());
        let remote = Arc::new(InMemoryRemote::new());
        let cache = ContentCache::new(store.clone(), remote.clone());
        (store, remote, cache)
    }

    #[tokio::test]
    async fn matching_tag_serves_cache_without_network() {
        let (_, remote, cache) = setup();
        let id = remote.add_file("Vault/Note.md", "v1", Some("t1"));

        assert_eq!(cache.get_or_fetch(&id, Some("t1")).await.unwrap(), "v1");
        let calls = remote.call_count();

        remote.update_file(&id, "v2", Some("t2"));
        assert_eq!(cache.get_or_fetch(&id, Some("t1")).await.unwrap(), "v1");
        assert_eq!(cache.get_or_fetch(&id, None).await.unwrap(), "v1");
        assert_eq!(remote.call_count(), calls);
    }

    #[tokio::test]
    async fn mismatched_tag_refetches() {
        let (_, remote, cache) = setup();
        let id = remote.add_file("Vault/Note.md", "v1", Some("t1"));
        cache.get_or_fetch(&id, Some("t1")).await.unwrap();

        remote.update_file(&id, "v2", Some("t2"));
        assert_eq!(cache.get_or_fetch(&id, Some("t2")).await.unwrap(), "v2");

        let entry = cache.get_cached(&id).await.unwrap();
        assert_eq!(entry.freshness_tag.as_deref(), Some("t2"));
        assert_eq!(remote.fetch_count(&id), 2);
    }

    #[tokio::test]
    async fn transient_failure_falls_back_to_cache() {
        let (_, remote, cache) = setup();
        let id = remote.add_file("Vault/Note.md", "v1", Some("t1"));
        cache.get_or_fetch(&id, Some("t1")).await.unwrap();

        remote.go_offline(RemoteError::Transient("offline".into()));
        assert_eq!(cache.get_or_fetch(&id, Some("t2")).await.unwrap(), "v1");

        remote.go_offline(RemoteError::AuthRequired);
        assert_eq!(cache.get_or_fetch(&id, Some("t2")).await.unwrap(), "v1");
        assert_eq!(remote.fetch_count(&id), 1);
    }

    #[tokio::test]
    async fn not_found_is_not_masked_by_cache() {
        let (_, remote, cache) = setup();
        let id = remote.add_file("Vault/Note.md", "v1", Some("t1"));
        cache.get_or_fetch(&id, Some("t1")).await.unwrap();

        remote.fail_item(&id, RemoteError::NotFound(id.clone()));
        let err = cache.get_or_fetch(&id, Some("t2")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn miss_with_failure_propagates() {
        let (_, remote, cache) = setup();
        let id = remote.add_file("Vault/Note.md", "v1", Some("t1"));

        remote.go_offline(RemoteError::AuthRequired);
        let err = cache.get_or_fetch(&id, None).await.unwrap_err();
        assert!(matches!(err, CacheError::Remote(RemoteError::AuthRequired)));
        assert!(!cache.is_cached(&id).await);
    }

    #[tokio::test]
    async fn refetch_records_caller_tag() {
        let (store, remote, cache) = setup();
        let id = remote.add_file("Vault/Note.md", "v1", Some("t1"));
        store
            .content
            .put(CachedContent {
                remote_id: id.clone(),
                content: "old".into(),
                freshness_tag: Some("t0".into()),
                last_synced_at: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(cache.get_or_fetch(&id, Some("t1")).await.unwrap(), "v1");
        assert_eq!(
            cache.get_cached(&id).await.unwrap().freshness_tag.as_deref(),
            Some("t1")
        );

        cache.clear().await.unwrap();
        assert_eq!(cache.get_or_fetch(&id, None).await.unwrap(), "v1");
        assert_eq!(cache.get_cached(&id).await.unwrap().freshness_tag, None);
    }

    #[tokio::test]
    async fn abandoned_caller_still_fills_cache() {
        let inner = InMemoryRemote::new();
        let id = inner.add_file("Vault/Note.md", "v1", Some("t1"));
        let remote = Arc::new(GatedRemote {
            inner,
            started: Notify::new(),
            release: Notify::new(),
        });
        let cache = Arc::new(ContentCache::new(Arc::new(Store::in_memory()), remote.clone()));

        let caller = tokio::spawn({
            let cache = cache.clone();
            let id = id.clone();
            async move { cache.get_or_fetch(&id, Some("t1")).await }
        });

        remote.started.notified().await;
        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());
        assert!(!cache.is_cached(&id).await);

        remote.release.notify_one();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cache.is_cached(&id).await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let entry = cache.get_cached(&id).await.unwrap();
        assert_eq!(entry.content, "v1");
        assert_eq!(entry.freshness_tag.as_deref(), Some("t1"));
    }
}
