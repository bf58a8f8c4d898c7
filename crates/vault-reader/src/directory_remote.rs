//! Local directory posing as the remote hierarchy.
//!
//! Item ids are the hex-encoded path relative to the base directory, and
//! freshness tags are the SHA-256 of a file's mtime and size, so an edit on
//! disk shows up as a tag change. Hidden entries (names starting with `.`)
//! are not listed.

use std::io;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use vault_cache::remote::Result;
use vault_cache::{ListPage, ListRequest, RemoteError, RemoteItem, RemoteSource};

const DEFAULT_PAGE_SIZE: usize = 200;

/// Remote source backed by a directory on the local filesystem
pub struct DirectoryRemote {
    base_path: PathBuf,
    page_size: usize,
}

impl DirectoryRemote {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Listings return at most `page_size` entries per page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn full_path(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            self.base_path.clone()
        } else {
            self.base_path.join(path)
        }
    }

    /// Item id for a relative path.
    pub fn id_for(path: &str) -> String {
        hex::encode(path.as_bytes())
    }

    fn path_for(id: &str) -> Result<String> {
        let bytes = hex::decode(id).map_err(|_| RemoteError::NotFound(id.to_string()))?;
        let path = String::from_utf8(bytes).map_err(|_| RemoteError::NotFound(id.to_string()))?;
        clean(&path)
    }

    async fn describe(&self, path: &str) -> Result<RemoteItem> {
        let metadata = fs::metadata(self.full_path(path))
            .await
            .map_err(|e| io_error(path, e))?;

        let modified = metadata.modified().ok();
        let mtime_millis = modified
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis())
            .unwrap_or(0);

        let is_folder = metadata.is_dir();
        let name = vault_paths::file_name(path).to_string();

        Ok(RemoteItem {
            id: Self::id_for(path),
            size: (!is_folder).then_some(metadata.len()),
            freshness_tag: (!is_folder).then(|| freshness_tag(mtime_millis, metadata.len())),
            is_folder,
            last_modified: modified.map(DateTime::<Utc>::from),
            parent_path: Some(vault_paths::parent_dir(path).to_string()),
            mime_type: (!is_folder).then(|| guess_mime(&name).to_string()),
            name,
        })
    }

    async fn list_page(&self, folder: &str, offset: usize) -> Result<ListPage> {
        let mut dir = fs::read_dir(self.full_path(folder))
            .await
            .map_err(|e| io_error(folder, e))?;

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| io_error(folder, e))? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();

        let end = (offset + self.page_size).min(names.len());
        let mut items = Vec::new();
        for name in names.get(offset..end).unwrap_or_default() {
            items.push(self.describe(&vault_paths::join(folder, name)).await?);
        }
        let next = (end < names.len()).then(|| format!("{}#{}", end, folder));

        Ok(ListPage { items, next })
    }
}

#[async_trait]
impl RemoteSource for DirectoryRemote {
    async fn list(&self, request: ListRequest) -> Result<ListPage> {
        match request {
            ListRequest::Folder(path) => self.list_page(&clean(&path)?, 0).await,
            ListRequest::Continue(token) => {
                let (offset, folder) = token
                    .split_once('#')
                    .and_then(|(offset, folder)| Some((offset.parse::<usize>().ok()?, folder)))
                    .ok_or_else(|| RemoteError::Transient(format!("bad continuation token: {}", token)))?;
                self.list_page(&clean(folder)?, offset).await
            }
        }
    }

    async fn fetch_content(&self, remote_id: &str) -> Result<String> {
        let bytes = self.fetch_bytes(remote_id).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn fetch_bytes(&self, remote_id: &str) -> Result<Vec<u8>> {
        let path = Self::path_for(remote_id)?;
        fs::read(self.full_path(&path))
            .await
            .map_err(|e| io_error(&path, e))
    }

    async fn get_item(&self, remote_id: &str) -> Result<RemoteItem> {
        let path = Self::path_for(remote_id)?;
        self.describe(&path).await
    }

    async fn fetch_by_path(&self, path: &str) -> Result<RemoteItem> {
        let path = clean(path)?;
        self.describe(&path).await
    }
}

/// Normalize a remote path and reject anything escaping the base directory.
fn clean(path: &str) -> Result<String> {
    let collapsed = vault_paths::collapse_separators(path.trim_matches('/'));
    vault_paths::validate_relative_path(&collapsed)
        .map_err(|e| RemoteError::NotFound(format!("{}: {}", path, e)))
}

fn io_error(path: &str, e: io::Error) -> RemoteError {
    match e.kind() {
        io::ErrorKind::NotFound => RemoteError::NotFound(path.to_string()),
        io::ErrorKind::PermissionDenied => RemoteError::AuthRequired,
        _ => RemoteError::Transient(format!("{}: {}", path, e)),
    }
}

fn freshness_tag(mtime_millis: u128, size: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(mtime_millis.to_le_bytes());
    hasher.update(size.to_le_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// Mime type by file extension, for the types notes usually embed.
fn guess_mime(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "md" => "text/markdown",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
