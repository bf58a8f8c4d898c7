//! Metadata index: path ↔ remote id ↔ freshness tag, built from listings.
//!
//! Rows are keyed by remote id and hold vault-relative paths. A listing
//! upserts every item it returns; nothing is ever removed except by a vault
//! switch or a manual clear, so the index may hold entries the remote has
//! since deleted.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::boundary::current_root;
use crate::error::Result;
use crate::model::IndexedFile;
use crate::remote::{ListRequest, RemoteItem, RemoteSource};
use crate::store::Store;

/// Ordering for [`MetadataIndex::browse`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    NameAsc,
    NameDesc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "name-asc" => Ok(SortOrder::NameAsc),
            "name-desc" => Ok(SortOrder::NameDesc),
            other => Err(format!(
                "unknown sort order '{}' (expected newest, oldest, name-asc or name-desc)",
                other
            )),
        }
    }
}

/// Filters for [`MetadataIndex::browse`].
#[derive(Debug, Clone, Default)]
pub struct BrowseOptions {
    /// Case-insensitive substring the file name must contain
    pub query: Option<String>,
    pub sort: SortOrder,
}

/// How a note's cached content relates to the index's freshness tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Cached with a tag equal to the indexed one
    Fresh,
    /// Cached, but the tags differ or one of them is unknown
    Stale,
    /// Never opened
    Missing,
}

/// Result of [`MetadataIndex::sync_tree`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub folders: usize,
    pub files: usize,
}

pub struct MetadataIndex<R: RemoteSource> {
    store: Arc<Store>,
    remote: Arc<R>,
}

impl<R: RemoteSource> MetadataIndex<R> {
    pub fn new(store: Arc<Store>, remote: Arc<R>) -> Self {
        Self { store, remote }
    }

    /// List a vault folder from the remote and upsert every item.
    ///
    /// Follows continuation tokens until the listing is exhausted. `folder`
    /// is vault-relative ("" for the root). Returns the folder's rows in
    /// listing order.
    pub async fn sync_folder(&self, folder: &str) -> Result<Vec<IndexedFile>> {
        let root = current_root(&self.store).await?;
        let folder = folder.trim_matches('/');
        let remote_folder = if folder.is_empty() {
            root.root_path
        } else {
            vault_paths::join(&root.root_path, folder)
        };

        let mut rows = Vec::new();
        let mut request = ListRequest::Folder(remote_folder);
        loop {
            let page = self.remote.list(request).await?;
            for item in page.items {
                rows.push(self.upsert_item(folder, item).await?);
            }
            match page.next {
                Some(token) => request = ListRequest::Continue(token),
                None => break,
            }
        }

        debug!("Indexed {} entries in '{}'", rows.len(), folder);
        Ok(rows)
    }

    /// Index every folder reachable from the vault root, breadth first.
    pub async fn sync_tree(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let mut queue = VecDeque::from([String::new()]);

        while let Some(folder) = queue.pop_front() {
            for row in self.sync_folder(&folder).await? {
                if row.is_folder {
                    report.folders += 1;
                    queue.push_back(row.path);
                } else {
                    report.files += 1;
                }
            }
        }

        info!(
            "Indexed vault: {} files in {} folders",
            report.files, report.folders
        );
        Ok(report)
    }

    async fn upsert_item(&self, folder: &str, item: RemoteItem) -> Result<IndexedFile> {
        // Listings never carry aliases; keep whatever was recorded before
        let aliases = self
            .store
            .files
            .get(&item.id)
            .await
            .map(|existing| existing.aliases)
            .unwrap_or_default();

        let row = IndexedFile {
            id: item.id.clone(),
            remote_id: item.id,
            path: vault_paths::join(folder, &item.name),
            name: item.name,
            freshness_tag: item.freshness_tag,
            last_modified: item.last_modified,
            size: item.size,
            parent_path: Some(folder.to_string()),
            aliases,
            is_folder: item.is_folder,
            mime_type: item.mime_type,
        };
        self.store.files.put(row.clone()).await?;
        Ok(row)
    }

    pub async fn get(&self, remote_id: &str) -> Option<IndexedFile> {
        self.store.files.get(remote_id).await
    }

    /// Look up an entry by vault-relative path.
    pub async fn get_by_path(&self, path: &str) -> Option<IndexedFile> {
        let path = path.trim_matches('/');
        self.store.files.find(|f| f.path == path).await
    }

    /// Document rows in first-indexed order.
    pub async fn documents(&self) -> Vec<IndexedFile> {
        self.store
            .files
            .all()
            .await
            .into_iter()
            .filter(IndexedFile::is_document)
            .collect()
    }

    /// Files (not folders) directly inside `folder`, filtered and sorted.
    pub async fn browse(&self, folder: &str, options: &BrowseOptions) -> Vec<IndexedFile> {
        let folder = folder.trim_matches('/');
        let query = options.query.as_deref().map(str::to_lowercase);

        let mut files: Vec<IndexedFile> = self
            .store
            .files
            .all()
            .await
            .into_iter()
            .filter(|f| !f.is_folder && vault_paths::parent_dir(&f.path) == folder)
            .filter(|f| {
                query
                    .as_deref()
                    .is_none_or(|q| f.name.to_lowercase().contains(q))
            })
            .collect();

        match options.sort {
            SortOrder::Newest => files.sort_by(|a, b| b.last_modified.cmp(&a.last_modified)),
            SortOrder::Oldest => files.sort_by(|a, b| a.last_modified.cmp(&b.last_modified)),
            SortOrder::NameAsc => files.sort_by_key(|f| f.name.to_lowercase()),
            SortOrder::NameDesc => {
                files.sort_by(|a, b| b.name.to_lowercase().cmp(&a.name.to_lowercase()))
            }
        }
        files
    }

    /// Record the aliases a note declares. Returns whether the row changed.
    pub async fn set_aliases(&self, remote_id: &str, aliases: Vec<String>) -> Result<bool> {
        let Some(mut row) = self.store.files.get(remote_id).await else {
            return Ok(false);
        };
        if row.aliases == aliases {
            return Ok(false);
        }
        row.aliases = aliases;
        self.store.files.put(row).await?;
        Ok(true)
    }

    /// Compare a note's cached content against its indexed freshness tag.
    pub async fn cache_status(&self, remote_id: &str) -> CacheStatus {
        let Some(cached) = self.store.content.get(remote_id).await else {
            return CacheStatus::Missing;
        };
        let indexed_tag = self
            .store
            .files
            .get(remote_id)
            .await
            .and_then(|row| row.freshness_tag);

        match (indexed_tag, cached.freshness_tag) {
            (Some(indexed), Some(cached)) if indexed == cached => CacheStatus::Fresh,
            _ => CacheStatus::Stale,
        }
    }
}
