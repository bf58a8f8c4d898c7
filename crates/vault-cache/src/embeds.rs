//! Embedded-resource resolution: `![](./img/a.png)` to attachment bytes.
//!
//! A reference is resolved against the note containing it, looked up in the
//! metadata index by vault-relative path and, failing that, asked of the
//! remote by absolute path. The bytes always come through the attachment
//! cache.
//!
//! Resolution never fails outright. Anything that goes wrong is logged and
//! reported as [`EmbedResolution::Unresolved`], so one broken image doesn't
//! stop a note from rendering.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::attachments::AttachmentCache;
use crate::boundary::current_root;
use crate::error::Result;
use crate::remote::RemoteSource;
use crate::store::Store;

/// Mime hint for embeds whose type neither the index nor the remote knows.
pub const EMBED_MIME_HINT: &str = "image/*";

/// Caller-owned handle to resolved attachment bytes.
///
/// Cloning shares the bytes. The handle holds no cache resources; dropping
/// it (or calling [`AttachmentHandle::revoke`]) releases this reference only.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentHandle {
    pub remote_id: String,
    /// Absolute remote path the reference resolved to
    pub path: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl AttachmentHandle {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Release the handle.
    pub fn revoke(self) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmbedResolution {
    Resolved(AttachmentHandle),
    /// Nothing usable at `path` (the absolute path, when one was computed)
    Unresolved { path: String },
}

impl EmbedResolution {
    pub fn handle(&self) -> Option<&AttachmentHandle> {
        match self {
            EmbedResolution::Resolved(handle) => Some(handle),
            EmbedResolution::Unresolved { .. } => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, EmbedResolution::Resolved(_))
    }
}

pub struct EmbedResolver<R: RemoteSource> {
    store: Arc<Store>,
    remote: Arc<R>,
    attachments: Arc<AttachmentCache<R>>,
}

impl<R: RemoteSource> EmbedResolver<R> {
    pub fn new(store: Arc<Store>, remote: Arc<R>, attachments: Arc<AttachmentCache<R>>) -> Self {
        Self {
            store,
            remote,
            attachments,
        }
    }

    /// Resolve `raw` as written in the note at `current_doc_path`, within the selected vault.
    pub async fn resolve(&self, raw: &str, current_doc_path: &str) -> EmbedResolution {
        match current_root(&self.store).await {
            Ok(root) => self.resolve_in(raw, current_doc_path, &root.root_path).await,
            Err(e) => {
                warn!(raw, "Cannot resolve embed: {}", e);
                EmbedResolution::Unresolved {
                    path: raw.to_string(),
                }
            }
        }
    }

    /// Resolve `raw` against an explicit vault root.
    pub async fn resolve_in(&self, raw: &str, current_doc_path: &str, vault_root: &str) -> EmbedResolution {
        let path = vault_paths::resolve_embed_path(raw, current_doc_path, vault_root);

        match self.lookup(&path, vault_root).await {
            Ok(Some(handle)) => EmbedResolution::Resolved(handle),
            Ok(None) => {
                debug!(path = %path, "Embed target is missing or a folder");
                EmbedResolution::Unresolved { path }
            }
            Err(e) => {
                warn!(path = %path, "Failed to resolve embed {}: {}", raw, e);
                EmbedResolution::Unresolved { path }
            }
        }
    }

    /// Resolve every reference of one note. Results are in input order.
    pub async fn resolve_embeds(&self, refs: &[&str], current_doc_path: &str) -> Vec<EmbedResolution> {
        join_all(refs.iter().map(|raw| self.resolve(raw, current_doc_path))).await
    }

    async fn lookup(&self, path: &str, vault_root: &str) -> Result<Option<AttachmentHandle>> {
        let indexed = match vault_paths::vault_relative(path, vault_root) {
            Some(relative) => self.store.files.find(|f| f.path == relative).await,
            None => None,
        };

        let (remote_id, mime_hint) = match indexed {
            Some(row) if row.is_folder => return Ok(None),
            Some(row) => (row.remote_id, row.mime_type),
            None => {
                let item = self.remote.fetch_by_path(path).await?;
                if item.is_folder {
                    return Ok(None);
                }
                (item.id, item.mime_type)
            }
        };

        let attachment = self
            .attachments
            .get_or_fetch(&remote_id, Some(mime_hint.as_deref().unwrap_or(EMBED_MIME_HINT)))
            .await?;

        Ok(Some(AttachmentHandle {
            remote_id,
            path: path.to_string(),
            mime_type: attachment.mime_type,
            bytes: Arc::from(attachment.bytes),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::model::{BOUNDARY_KEY, VaultBoundary};
    use crate::remote::{InMemoryRemote, RemoteError};
    use chrono::Utc;

    async fn setup() -> (Arc<Store>, Arc<InMemoryRemote>, EmbedResolver<InMemoryRemote>) {
        let store = Arc::new(Store::in_memory());
        store
            .boundary
            .put(VaultBoundary {
                root_path: "Vault".into(),
                root_name: "Vault".into(),
                root_id: "root".into(),
                selected_at: Utc::now(),
            })
            .await
            .unwrap();
        let remote = Arc::new(InMemoryRemote::new());
        let attachments = Arc::new(AttachmentCache::new(
            store.clone(),
            remote.clone(),
            CacheConfig::default(),
        ));
        let embeds = EmbedResolver::new(store.clone(), remote.clone(), attachments);
        (store, remote, embeds)
    }

    #[tokio::test]
    async fn resolves_relative_reference_through_remote() {
        let (_, remote, embeds) = setup().await;
        let id = remote.add_attachment("Vault/Folder/img/a.png", &[1, 2], "image/png");

        let resolution = embeds.resolve("./img/a.png", "Folder/Note.md").await;

        let handle = resolution.handle().unwrap();
        assert_eq!(handle.remote_id, id);
        assert_eq!(handle.path, "Vault/Folder/img/a.png");
        assert_eq!(handle.mime_type, "image/png");
        assert_eq!(&handle.bytes[..], &[1, 2]);
    }

    #[tokio::test]
    async fn unknown_mime_uses_image_hint() {
        let (_, remote, embeds) = setup().await;
        remote.add_file("Vault/assets/raw", "abc", None);

        let resolution = embeds.resolve("/assets/raw", "Folder/Note.md").await;

        assert_eq!(resolution.handle().unwrap().mime_type, EMBED_MIME_HINT);
    }

    #[tokio::test]
    async fn missing_and_folder_targets_are_unresolved() {
        let (_, remote, embeds) = setup().await;
        remote.add_folder("Vault/Folder/img");

        assert_eq!(
            embeds.resolve("../nope.png", "Folder/Note.md").await,
            EmbedResolution::Unresolved {
                path: "Vault/nope.png".into()
            }
        );
        assert!(!embeds.resolve("img", "Folder/Note.md").await.is_resolved());
    }

    #[tokio::test]
    async fn one_failure_does_not_fail_the_rest() {
        let (_, remote, embeds) = setup().await;
        remote.add_attachment("Vault/a.png", &[1], "image/png");
        let broken = remote.add_attachment("Vault/b.png", &[2], "image/png");
        remote.fail_item(&broken, RemoteError::Transient("reset".into()));

        let results = embeds
            .resolve_embeds(&["a.png", "b.png", "c.png"], "Note.md")
            .await;

        let resolved: Vec<bool> = results.iter().map(EmbedResolution::is_resolved).collect();
        assert_eq!(resolved, vec![true, false, false]);
    }

    #[tokio::test]
    async fn no_selected_vault_is_unresolved() {
        let (store, _, embeds) = setup().await;
        store.boundary.delete(BOUNDARY_KEY).await.unwrap();

        let resolution = embeds.resolve("a.png", "Note.md").await;
        assert!(!resolution.is_resolved());
    }

    #[test]
    fn handle_clones_share_bytes() {
        let handle = AttachmentHandle {
            remote_id: "a".into(),
            path: "Vault/a.png".into(),
            mime_type: "image/png".into(),
            bytes: Arc::from(vec![1u8, 2, 3]),
        };
        let copy = handle.clone();
        assert!(Arc::ptr_eq(&handle.bytes, &copy.bytes));
        handle.revoke();
        assert_eq!(copy.len(), 3);
    }
}
