//! Remote collaborator abstraction: the hierarchical store notes are mirrored from.
//!
//! Implementations:
//! - `InMemoryRemote` - For testing (scriptable failures, call counting)
//! - `DirectoryRemote` (in vault-reader) - A local directory posing as the remote
//!
//! Credentials are the implementation's concern. An expired credential must
//! surface as [`RemoteError::AuthRequired`]; nothing in this crate retries it.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Remote item not found: {0}")]
    NotFound(String),

    #[error("Authentication required")]
    AuthRequired,

    #[error("Transient remote failure: {0}")]
    Transient(String),
}

impl RemoteError {
    /// Whether a cache may answer with previously stored data instead.
    ///
    /// A missing item is a definite answer; network and credential failures
    /// are not.
    pub fn allows_stale_fallback(&self) -> bool {
        matches!(self, RemoteError::AuthRequired | RemoteError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Descriptor of a remote file or folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: String,
    pub name: String,
    pub size: Option<u64>,
    pub freshness_tag: Option<String>,
    pub is_folder: bool,
    pub last_modified: Option<DateTime<Utc>>,
    /// Remote path of the containing folder
    pub parent_path: Option<String>,
    pub mime_type: Option<String>,
}

/// What to list: a folder by remote path, or the next page of an earlier listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListRequest {
    Folder(String),
    Continue(String),
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub items: Vec<RemoteItem>,
    /// Continuation token; callers must follow it until it is None
    pub next: Option<String>,
}

/// Listing and fetch operations against the remote hierarchy.
#[async_trait]
pub trait RemoteSource: Send + Sync + 'static {
    /// List one page of a folder's children.
    async fn list(&self, request: ListRequest) -> Result<ListPage>;

    /// Download a file's content as text.
    async fn fetch_content(&self, remote_id: &str) -> Result<String>;

    /// Download a file's raw bytes.
    async fn fetch_bytes(&self, remote_id: &str) -> Result<Vec<u8>>;

    /// Get an item's descriptor by id.
    async fn get_item(&self, remote_id: &str) -> Result<RemoteItem>;

    /// Get an item's descriptor by its full remote path.
    async fn fetch_by_path(&self, path: &str) -> Result<RemoteItem>;
}

struct Entry {
    item: RemoteItem,
    body: Vec<u8>,
}

/// In-memory remote for testing
pub struct InMemoryRemote {
    /// Entries keyed by normalized remote path
    entries: RwLock<BTreeMap<String, Entry>>,
    next_id: AtomicU64,
    page_size: usize,
    /// Failure returned by every call while set
    outage: RwLock<Option<RemoteError>>,
    /// Failures for calls that name a specific item id
    item_failures: RwLock<HashMap<String, RemoteError>>,
    calls: AtomicUsize,
    fetches: Mutex<HashMap<String, usize>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    /// Remote whose listings return at most `page_size` items per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            page_size: page_size.max(1),
            outage: RwLock::new(None),
            item_failures: RwLock::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            fetches: Mutex::new(HashMap::new()),
        }
    }

    fn normalize_path(path: &str) -> String {
        path.trim_matches('/').to_string()
    }

    fn allocate_id(&self) -> String {
        format!("item-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn insert(&self, path: &str, is_folder: bool, body: Vec<u8>, tag: Option<&str>, mime: Option<&str>) -> String {
        let path = Self::normalize_path(path);
        let parent = vault_paths::parent_dir(&path).to_string();
        if !parent.is_empty() {
            self.add_folder(&parent);
        }

        let mut entries = self.entries.write().unwrap();
        if let Some(existing) = entries.get_mut(&path) {
            // Re-adding a file replaces its body in place; folders are left alone
            if !is_folder && !existing.item.is_folder {
                existing.item.size = Some(body.len() as u64);
                existing.item.freshness_tag = tag.map(str::to_string);
                existing.item.mime_type = mime.map(str::to_string);
                existing.item.last_modified = Some(Utc::now());
                existing.body = body;
            }
            return existing.item.id.clone();
        }

        let id = self.allocate_id();
        let item = RemoteItem {
            id: id.clone(),
            name: vault_paths::file_name(&path).to_string(),
            size: (!is_folder).then_some(body.len() as u64),
            freshness_tag: tag.map(str::to_string),
            is_folder,
            last_modified: Some(Utc::now()),
            parent_path: Some(parent),
            mime_type: mime.map(str::to_string),
        };
        entries.insert(path, Entry { item, body });
        id
    }

    /// Add a folder (and its parents). Returns the folder's id.
    pub fn add_folder(&self, path: &str) -> String {
        self.insert(path, true, Vec::new(), None, None)
    }

    /// Add a text file (creating parent folders). Returns its id.
    ///
    /// Adding a path that already holds a file replaces its body and tag and
    /// keeps its id.
    pub fn add_file(&self, path: &str, body: &str, tag: Option<&str>) -> String {
        self.insert(path, false, body.as_bytes().to_vec(), tag, None)
    }

    /// Add a binary file with a mime type. Returns its id.
    pub fn add_attachment(&self, path: &str, bytes: &[u8], mime_type: &str) -> String {
        self.insert(path, false, bytes.to_vec(), None, Some(mime_type))
    }

    /// Replace a file's body and freshness tag, as if edited remotely.
    pub fn update_file(&self, remote_id: &str, body: &str, tag: Option<&str>) {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.values_mut().find(|e| e.item.id == remote_id) {
            entry.body = body.as_bytes().to_vec();
            entry.item.size = Some(entry.body.len() as u64);
            entry.item.freshness_tag = tag.map(str::to_string);
            entry.item.last_modified = Some(Utc::now());
        }
    }

    /// Fail every call with `error` until [`InMemoryRemote::restore`].
    pub fn go_offline(&self, error: RemoteError) {
        *self.outage.write().unwrap() = Some(error);
    }

    /// End an outage started by [`InMemoryRemote::go_offline`].
    pub fn restore(&self) {
        *self.outage.write().unwrap() = None;
    }

    /// Fail calls naming `remote_id` with `error`.
    pub fn fail_item(&self, remote_id: &str, error: RemoteError) {
        self.item_failures
            .write()
            .unwrap()
            .insert(remote_id.to_string(), error);
    }

    /// Total calls made, successful or not.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Content and byte downloads attempted for `remote_id`.
    pub fn fetch_count(&self, remote_id: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(remote_id)
            .copied()
            .unwrap_or(0)
    }

    fn check(&self, remote_id: Option<&str>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.outage.read().unwrap().clone() {
            return Err(error);
        }
        if let Some(id) = remote_id {
            if let Some(error) = self.item_failures.read().unwrap().get(id) {
                return Err(error.clone());
            }
        }
        Ok(())
    }

    fn record_fetch(&self, remote_id: &str) {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(remote_id.to_string())
            .or_insert(0) += 1;
    }

    fn body_of(&self, remote_id: &str) -> Result<Vec<u8>> {
        let entries = self.entries.read().unwrap();
        entries
            .values()
            .find(|e| e.item.id == remote_id && !e.item.is_folder)
            .map(|e| e.body.clone())
            .ok_or_else(|| RemoteError::NotFound(remote_id.to_string()))
    }

    fn page(&self, folder: &str, offset: usize) -> Result<ListPage> {
        let entries = self.entries.read().unwrap();
        if !folder.is_empty() && !entries.get(folder).is_some_and(|e| e.item.is_folder) {
            return Err(RemoteError::NotFound(folder.to_string()));
        }

        let children: Vec<RemoteItem> = entries
            .iter()
            .filter(|(path, _)| !path.is_empty() && vault_paths::parent_dir(path) == folder)
            .map(|(_, entry)| entry.item.clone())
            .collect();

        let end = (offset + self.page_size).min(children.len());
        let items = children.get(offset..end).map(<[RemoteItem]>::to_vec).unwrap_or_default();
        let next = (end < children.len()).then(|| format!("{}#{}", end, folder));

        Ok(ListPage { items, next })
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteSource for InMemoryRemote {
    async fn list(&self, request: ListRequest) -> Result<ListPage> {
        self.check(None)?;
        match request {
            ListRequest::Folder(path) => self.page(&Self::normalize_path(&path), 0),
            ListRequest::Continue(token) => {
                let (offset, folder) = token
                    .split_once('#')
                    .and_then(|(offset, folder)| Some((offset.parse::<usize>().ok()?, folder)))
                    .ok_or_else(|| RemoteError::Transient(format!("bad continuation token: {}", token)))?;
                self.page(folder, offset)
            }
        }
    }

    async fn fetch_content(&self, remote_id: &str) -> Result<String> {
        self.check(Some(remote_id))?;
        self.record_fetch(remote_id);
        let body = self.body_of(remote_id)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn fetch_bytes(&self, remote_id: &str) -> Result<Vec<u8>> {
        self.check(Some(remote_id))?;
        self.record_fetch(remote_id);
        self.body_of(remote_id)
    }

    async fn get_item(&self, remote_id: &str) -> Result<RemoteItem> {
        self.check(Some(remote_id))?;
        let entries = self.entries.read().unwrap();
        entries
            .values()
            .find(|e| e.item.id == remote_id)
            .map(|e| e.item.clone())
            .ok_or_else(|| RemoteError::NotFound(remote_id.to_string()))
    }

    async fn fetch_by_path(&self, path: &str) -> Result<RemoteItem> {
        self.check(None)?;
        let path = Self::normalize_path(path);
        let entries = self.entries.read().unwrap();
        entries
            .get(&path)
            .map(|e| e.item.clone())
            .ok_or(RemoteError::NotFound(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listing_pages_until_exhausted() {
        let remote = InMemoryRemote::with_page_size(2);
        remote.add_file("Vault/a.md", "a", None);
        remote.add_file("Vault/b.md", "b", None);
        remote.add_file("Vault/c.md", "c", None);
        remote.add_file("Vault/Sub/d.md", "d", None);

        let first = remote.list(ListRequest::Folder("Vault".into())).await.unwrap();
        assert_eq!(first.items.len(), 2);
        let token = first.next.unwrap();

        let second = remote.list(ListRequest::Continue(token)).await.unwrap();
        assert!(second.next.is_none());

        let mut names: Vec<String> = first.items.into_iter().chain(second.items).map(|i| i.name).collect();
        names.sort();
        assert_eq!(names, vec!["Sub", "a.md", "b.md", "c.md"]);
    }

    #[tokio::test]
    async fn re_adding_a_file_replaces_it_in_place() {
        let remote = InMemoryRemote::new();
        let id = remote.add_file("Vault/a.md", "old", Some("t1"));
        let folder = remote.add_folder("Vault");

        assert_eq!(remote.add_file("Vault/a.md", "newer body", Some("t2")), id);
        assert_eq!(remote.fetch_content(&id).await.unwrap(), "newer body");

        let item = remote.get_item(&id).await.unwrap();
        assert_eq!(item.freshness_tag.as_deref(), Some("t2"));
        assert_eq!(item.size, Some(10));
        assert!(remote.get_item(&folder).await.unwrap().is_folder);
    }

    #[tokio::test]
    async fn missing_folder_is_not_found() {
        let remote = InMemoryRemote::new();
        let err = remote.list(ListRequest::Folder("Nope".into())).await.unwrap_err();
        assert_eq!(err, RemoteError::NotFound("Nope".into()));
    }

    #[tokio::test]
    async fn outage_and_item_failures() {
        let remote = InMemoryRemote::new();
        let id = remote.add_file("Vault/a.md", "a", Some("t1"));

        remote.go_offline(RemoteError::Transient("offline".into()));
        assert!(remote.fetch_content(&id).await.is_err());
        remote.restore();
        assert_eq!(remote.fetch_content(&id).await.unwrap(), "a");

        remote.fail_item(&id, RemoteError::AuthRequired);
        assert_eq!(remote.get_item(&id).await.unwrap_err(), RemoteError::AuthRequired);
        assert_eq!(remote.fetch_count(&id), 1);
        assert_eq!(remote.call_count(), 3);
    }

    #[tokio::test]
    async fn fetch_by_path_finds_folders_and_files() {
        let remote = InMemoryRemote::new();
        remote.add_attachment("/Vault/img/a.png", &[1, 2, 3], "image/png");

        let folder = remote.fetch_by_path("Vault/img").await.unwrap();
        assert!(folder.is_folder);

        let file = remote.fetch_by_path("Vault/img/a.png").await.unwrap();
        assert_eq!(file.mime_type.as_deref(), Some("image/png"));
        assert_eq!(file.size, Some(3));
        assert_eq!(file.parent_path.as_deref(), Some("Vault/img"));
    }

    #[test]
    fn only_network_and_auth_failures_allow_stale_fallback() {
        assert!(RemoteError::Transient("x".into()).allows_stale_fallback());
        assert!(RemoteError::AuthRequired.allows_stale_fallback());
        assert!(!RemoteError::NotFound("x".into()).allows_stale_fallback());
    }
}
