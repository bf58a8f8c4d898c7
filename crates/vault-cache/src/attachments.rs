//! Attachment cache: immutable binary blobs, fetched once.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::model::CachedAttachment;
use crate::remote::RemoteSource;
use crate::store::Store;

pub struct AttachmentCache<R: RemoteSource> {
    store: Arc<Store>,
    remote: Arc<R>,
    config: CacheConfig,
}

impl<R: RemoteSource> AttachmentCache<R> {
    pub fn new(store: Arc<Store>, remote: Arc<R>, config: CacheConfig) -> Self {
        Self { store, remote, config }
    }

    /// Return an attachment, downloading it on first use.
    ///
    /// Cached attachments are never revalidated. A failed download is
    /// returned as an error; there is nothing older to fall back to.
    pub async fn get_or_fetch(&self, remote_id: &str, mime_hint: Option<&str>) -> Result<CachedAttachment> {
        if let Some(cached) = self.store.attachments.get(remote_id).await {
            debug!(remote_id, "Attachment cache hit");
            return Ok(cached);
        }

        debug!(remote_id, "Attachment cache miss, fetching");
        let bytes = self.remote.fetch_bytes(remote_id).await?;

        let item = match self.remote.get_item(remote_id).await {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(remote_id, "No metadata for attachment: {}", e);
                None
            }
        };
        let (size, remote_mime) = item.map(|i| (i.size, i.mime_type)).unwrap_or_default();

        let attachment = CachedAttachment {
            remote_id: remote_id.to_string(),
            size: size.unwrap_or(bytes.len() as u64),
            mime_type: remote_mime
                .or_else(|| mime_hint.map(str::to_string))
                .unwrap_or_else(|| self.config.default_attachment_mime.clone()),
            bytes,
            last_synced_at: Utc::now(),
        };
        self.store.attachments.put(attachment.clone()).await?;

        Ok(attachment)
    }

    pub async fn get_cached(&self, remote_id: &str) -> Option<CachedAttachment> {
        self.store.attachments.get(remote_id).await
    }

    /// Drop every cached attachment.
    pub async fn clear(&self) -> Result<()> {
        self.store.attachments.clear().await?;
        Ok(())
    }
}
