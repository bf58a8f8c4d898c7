//! Rows persisted in the local store.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wiki_links::LinkCandidate;

use crate::store::Record;

/// Key of the singleton vault boundary row.
pub const BOUNDARY_KEY: &str = "current";

/// One known remote entry, built from directory listings.
///
/// `path` is relative to the vault root. Rows are upserted on every listing
/// and never deleted automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedFile {
    pub id: String,
    pub remote_id: String,
    /// Vault-relative path: "Folder/My Note.md"
    pub path: String,
    /// File name with extension: "My Note.md"
    pub name: String,
    pub freshness_tag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
    /// Vault-relative folder containing this entry ("" for the root)
    pub parent_path: Option<String>,
    /// Alternative link names, recorded from frontmatter when a note is opened
    pub aliases: Vec<String>,
    pub is_folder: bool,
    pub mime_type: Option<String>,
}

impl IndexedFile {
    /// Whether this entry is a linkable document (a markdown file).
    pub fn is_document(&self) -> bool {
        !self.is_folder && wiki_links::is_document(&self.name)
    }
}

impl Record for IndexedFile {
    const TABLE: &'static str = "files";

    fn key(&self) -> String {
        self.id.clone()
    }
}

impl LinkCandidate for IndexedFile {
    fn id(&self) -> &str {
        &self.remote_id
    }

    fn file_name(&self) -> &str {
        &self.name
    }

    fn aliases(&self) -> &[String] {
        &self.aliases
    }
}

/// Text content of a note that has been opened at least once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedContent {
    pub remote_id: String,
    pub content: String,
    pub freshness_tag: Option<String>,
    pub last_synced_at: DateTime<Utc>,
}

impl Record for CachedContent {
    const TABLE: &'static str = "content";

    fn key(&self) -> String {
        self.remote_id.clone()
    }
}

/// Binary attachment. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAttachment {
    pub remote_id: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub size: u64,
    pub last_synced_at: DateTime<Utc>,
}

impl Record for CachedAttachment {
    const TABLE: &'static str = "attachments";

    fn key(&self) -> String {
        self.remote_id.clone()
    }
}

/// The active vault root within the remote hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultBoundary {
    /// Remote path of the vault root: "Documents/Vault"
    pub root_path: String,
    pub root_name: String,
    pub root_id: String,
    pub selected_at: DateTime<Utc>,
}

impl Record for VaultBoundary {
    const TABLE: &'static str = "vault_boundary";

    fn key(&self) -> String {
        BOUNDARY_KEY.to_string()
    }
}

/// A local change waiting to be written back to the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PendingChange {
    Upload {
        path: String,
        bytes: Vec<u8>,
        mime_type: String,
    },
    Update {
        content: String,
        base_freshness_tag: Option<String>,
    },
    Delete,
}

impl PendingChange {
    pub fn kind(&self) -> PendingKind {
        match self {
            PendingChange::Upload { .. } => PendingKind::Upload,
            PendingChange::Update { .. } => PendingKind::Update,
            PendingChange::Delete => PendingKind::Delete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Upload,
    Delete,
    Update,
}

impl Display for PendingKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PendingKind::Upload => write!(f, "upload"),
            PendingKind::Delete => write!(f, "delete"),
            PendingKind::Update => write!(f, "update"),
        }
    }
}

/// Queued write-back operation. Stored, never reconciled by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub id: u64,
    pub remote_id: String,
    pub change: PendingChange,
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
}

impl Record for PendingOperation {
    const TABLE: &'static str = "pending_ops";

    fn key(&self) -> String {
        pending_key(self.id)
    }
}

/// High-water mark of an id sequence. Only ever moves forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub name: String,
    pub last_issued: u64,
}

impl Record for Sequence {
    const TABLE: &'static str = "sequences";

    fn key(&self) -> String {
        self.name.clone()
    }
}

/// Row key of a pending operation, zero-padded so lexical order matches numeric order.
pub(crate) fn pending_key(id: u64) -> String {
    format!("{:020}", id)
}
