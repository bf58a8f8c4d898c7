//! Local store: durable keyed tables that survive process restarts.
//!
//! Each table lives in its own directory with one bincode file per row,
//! named by the SHA-256 of the row key. Writes go to a temp file which is
//! then renamed into place, so a row is either fully written or untouched.
//!
//! Tables are independent. There is no cross-table transaction: every table
//! can be rebuilt from the remote, so a crash between two table writes only
//! costs a refetch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::model::{
    CachedAttachment, CachedContent, IndexedFile, PendingOperation, Sequence, VaultBoundary,
};

const ROW_EXTENSION: &str = "bin";
const TEMP_EXTENSION: &str = "tmp";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode row for table {table}: {message}")]
    Encode { table: &'static str, message: String },

    #[error("Failed to decode row for table {table}: {message}")]
    Decode { table: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A value that can be stored in a [`Table`].
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Table (and directory) name.
    const TABLE: &'static str;

    /// Primary key. Putting a record with an existing key replaces it.
    fn key(&self) -> String;
}

#[derive(Serialize, Deserialize)]
struct StoredRow<R> {
    /// Insertion sequence, kept across upserts so iteration order is stable
    seq: u64,
    record: R,
}

struct Rows<R> {
    by_key: HashMap<String, StoredRow<R>>,
    next_seq: u64,
}

impl<R> Rows<R> {
    fn empty() -> Self {
        Self {
            by_key: HashMap::new(),
            next_seq: 0,
        }
    }

    fn ordered(&self) -> Vec<&StoredRow<R>> {
        let mut rows: Vec<&StoredRow<R>> = self.by_key.values().collect();
        rows.sort_by_key(|row| row.seq);
        rows
    }
}

/// Typed handle to one table.
///
/// Mutations hold the table's write lock until the row file is on disk, so
/// writes to one table are serialized.
pub struct Table<R: Record> {
    /// Row directory, or None for a memory-only table
    dir: Option<PathBuf>,
    rows: RwLock<Rows<R>>,
}

impl<R: Record> Table<R> {
    /// Create a table that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            rows: RwLock::new(Rows::empty()),
        }
    }

    /// Open (or create) the table under `root`, loading every readable row.
    ///
    /// Rows that fail to decode are skipped with a warning; leftover temp
    /// files from interrupted writes are removed.
    pub async fn open(root: &Path) -> Result<Self> {
        let dir = root.join(R::TABLE);
        fs::create_dir_all(&dir).await?;

        let mut rows = Rows::empty();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match path.extension().and_then(|ext| ext.to_str()) {
                Some(ROW_EXTENSION) => match Self::read_row(&path).await {
                    Ok(row) => {
                        rows.next_seq = rows.next_seq.max(row.seq + 1);
                        rows.by_key.insert(row.record.key(), row);
                    }
                    Err(e) => {
                        warn!(table = R::TABLE, path = %path.display(), "Skipping unreadable row: {}", e);
                    }
                },
                Some(TEMP_EXTENSION) => {
                    let _ = fs::remove_file(&path).await;
                }
                _ => {}
            }
        }

        debug!(table = R::TABLE, "Loaded {} rows", rows.by_key.len());

        Ok(Self {
            dir: Some(dir),
            rows: RwLock::new(rows),
        })
    }

    async fn read_row(path: &Path) -> Result<StoredRow<R>> {
        let bytes = fs::read(path).await?;
        bincode::deserialize(&bytes).map_err(|e| StoreError::Decode {
            table: R::TABLE,
            message: e.to_string(),
        })
    }

    fn row_path(&self, key: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.{}", hash_key(key), ROW_EXTENSION)))
    }

    /// Get a row by key.
    pub async fn get(&self, key: &str) -> Option<R> {
        let rows = self.rows.read().await;
        rows.by_key.get(key).map(|row| row.record.clone())
    }

    /// Insert or replace a row.
    pub async fn put(&self, record: R) -> Result<()> {
        let key = record.key();
        let mut rows = self.rows.write().await;

        let seq = match rows.by_key.get(&key) {
            Some(existing) => existing.seq,
            None => {
                let seq = rows.next_seq;
                rows.next_seq += 1;
                seq
            }
        };
        let row = StoredRow { seq, record };

        if let Some(path) = self.row_path(&key) {
            let bytes = bincode::serialize(&row).map_err(|e| StoreError::Encode {
                table: R::TABLE,
                message: e.to_string(),
            })?;
            atomic_write(&path, &bytes).await?;
        }

        rows.by_key.insert(key, row);
        Ok(())
    }

    /// Delete a row. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut rows = self.rows.write().await;

        if let Some(path) = self.row_path(key) {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(rows.by_key.remove(key).is_some())
    }

    /// Remove every row.
    pub async fn clear(&self) -> Result<()> {
        let mut rows = self.rows.write().await;

        if let Some(dir) = &self.dir {
            match fs::remove_dir_all(dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            fs::create_dir_all(dir).await?;
        }

        debug!(table = R::TABLE, "Cleared {} rows", rows.by_key.len());
        *rows = Rows::empty();
        Ok(())
    }

    /// All rows in first-insertion order.
    pub async fn all(&self) -> Vec<R> {
        let rows = self.rows.read().await;
        rows.ordered()
            .into_iter()
            .map(|row| row.record.clone())
            .collect()
    }

    /// First row (in insertion order) matching `predicate`.
    pub async fn find(&self, predicate: impl Fn(&R) -> bool) -> Option<R> {
        let rows = self.rows.read().await;
        rows.ordered()
            .into_iter()
            .find(|row| predicate(&row.record))
            .map(|row| row.record.clone())
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.by_key.len()
    }
}

/// The application's local store: one typed handle per table.
pub struct Store {
    pub files: Table<IndexedFile>,
    pub content: Table<CachedContent>,
    pub attachments: Table<CachedAttachment>,
    pub boundary: Table<VaultBoundary>,
    pub pending: Table<PendingOperation>,
    pub sequences: Table<Sequence>,
}

impl Store {
    /// Open the durable store rooted at `root`, creating it if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).await?;

        Ok(Self {
            files: Table::open(root).await?,
            content: Table::open(root).await?,
            attachments: Table::open(root).await?,
            boundary: Table::open(root).await?,
            pending: Table::open(root).await?,
            sequences: Table::open(root).await?,
        })
    }

    /// A store that forgets everything when dropped.
    pub fn in_memory() -> Self {
        Self {
            files: Table::in_memory(),
            content: Table::in_memory(),
            attachments: Table::in_memory(),
            boundary: Table::in_memory(),
            pending: Table::in_memory(),
            sequences: Table::in_memory(),
        }
    }
}

fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a random hex string for temp file names.
fn random_hex() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    hex::encode(bytes)
}

/// Atomic write using temp file + rename.
async fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension(format!("{}.{}", random_hex(), TEMP_EXTENSION));

    if let Err(e) = fs::write(&temp_path, bytes).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }

    Ok(())
}
