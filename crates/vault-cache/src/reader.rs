//! Application root: one store, one remote, every component wired to both.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::attachments::AttachmentCache;
use crate::boundary::{VaultSelection, current_root};
use crate::config::CacheConfig;
use crate::content::ContentCache;
use crate::embeds::EmbedResolver;
use crate::error::Result;
use crate::index::MetadataIndex;
use crate::links::LinkResolver;
use crate::pending::PendingQueue;
use crate::remote::{RemoteError, RemoteSource};
use crate::store::Store;

/// An opened note.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub remote_id: String,
    pub content: String,
    /// Aliases declared in the note's frontmatter
    pub aliases: Vec<String>,
}

pub struct VaultReader<R: RemoteSource> {
    store: Arc<Store>,
    remote: Arc<R>,
    config: CacheConfig,
    index: MetadataIndex<R>,
    content: ContentCache<R>,
    attachments: Arc<AttachmentCache<R>>,
    links: LinkResolver,
    embeds: EmbedResolver<R>,
    boundary: VaultSelection,
    pending: PendingQueue,
}

impl<R: RemoteSource> VaultReader<R> {
    pub fn new(store: Arc<Store>, remote: Arc<R>, config: CacheConfig) -> Self {
        let attachments = Arc::new(AttachmentCache::new(store.clone(), remote.clone(), config.clone()));
        Self {
            index: MetadataIndex::new(store.clone(), remote.clone()),
            content: ContentCache::new(store.clone(), remote.clone()),
            embeds: EmbedResolver::new(store.clone(), remote.clone(), attachments.clone()),
            attachments,
            links: LinkResolver::new(store.clone()),
            boundary: VaultSelection::new(store.clone(), config.clone()),
            pending: PendingQueue::new(store.clone()),
            store,
            remote,
            config,
        }
    }

    /// Open the durable store under `cache_dir` and wire everything to it.
    pub async fn open(cache_dir: impl AsRef<Path>, remote: Arc<R>, config: CacheConfig) -> Result<Self> {
        let store = Store::open(cache_dir).await?;
        Ok(Self::new(Arc::new(store), remote, config))
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn index(&self) -> &MetadataIndex<R> {
        &self.index
    }

    pub fn content(&self) -> &ContentCache<R> {
        &self.content
    }

    pub fn attachments(&self) -> &AttachmentCache<R> {
        &self.attachments
    }

    pub fn links(&self) -> &LinkResolver {
        &self.links
    }

    pub fn embeds(&self) -> &EmbedResolver<R> {
        &self.embeds
    }

    pub fn boundary(&self) -> &VaultSelection {
        &self.boundary
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    /// Open a note by remote id.
    ///
    /// The note's current freshness tag is read from the remote so a cached
    /// copy is only served when it is current. When the remote can't be
    /// reached the indexed tag stands in, which lets the cache answer
    /// offline. Frontmatter aliases are recorded on the index row.
    pub async fn open_note(&self, remote_id: &str) -> Result<Note> {
        let known_tag = match self.remote.get_item(remote_id).await {
            Ok(item) => item.freshness_tag,
            Err(e) if e.allows_stale_fallback() => {
                warn!(remote_id, "Could not check freshness, using indexed tag: {}", e);
                self.index.get(remote_id).await.and_then(|row| row.freshness_tag)
            }
            Err(e) => return Err(e.into()),
        };

        let content = self.content.get_or_fetch(remote_id, known_tag.as_deref()).await?;

        let aliases = vault_paths::extract_aliases(&content);
        if self.index.set_aliases(remote_id, aliases.clone()).await? {
            debug!(remote_id, "Recorded {} aliases", aliases.len());
        }

        Ok(Note {
            remote_id: remote_id.to_string(),
            content,
            aliases,
        })
    }

    /// Open a note by vault-relative path, asking the remote when it isn't indexed.
    pub async fn open_note_at(&self, path: &str) -> Result<Note> {
        let remote_id = match self.index.get_by_path(path).await {
            Some(row) if row.is_folder => return Err(RemoteError::NotFound(row.path).into()),
            Some(row) => row.remote_id,
            None => {
                let root = current_root(&self.store).await?;
                let absolute = vault_paths::join(&root.root_path, path.trim_matches('/'));
                let item = self.remote.fetch_by_path(&absolute).await?;
                if item.is_folder {
                    return Err(RemoteError::NotFound(absolute).into());
                }
                item.id
            }
        };
        self.open_note(&remote_id).await
    }

    /// Follow a wiki link to the note it names. None when the link doesn't resolve.
    pub async fn open_link(&self, link: &str) -> Result<Option<Note>> {
        match self.links.resolve_document(link).await {
            Some(doc) => self.open_note(&doc.remote_id).await.map(Some),
            None => Ok(None),
        }
    }
}
