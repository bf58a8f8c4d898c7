//! vault-cache: Offline content cache and link/embed resolution for remote vaults.
//!
//! This crate provides:
//! - A durable local store of keyed tables
//! - A metadata index built from remote directory listings
//! - Freshness-validated note content and immutable attachment caches
//! - Wiki-link and embedded-resource resolution over the index
//! - The vault boundary that scopes and invalidates all of the above
//! - The `RemoteSource` trait abstraction over the remote hierarchy

pub mod attachments;
pub mod boundary;
pub mod config;
pub mod content;
pub mod embeds;
pub mod error;
pub mod index;
pub mod links;
pub mod model;
pub mod pending;
pub mod reader;
pub mod remote;
pub mod store;

pub use attachments::AttachmentCache;
pub use boundary::VaultSelection;
pub use config::CacheConfig;
pub use content::ContentCache;
pub use embeds::{AttachmentHandle, EmbedResolution, EmbedResolver};
pub use error::{CacheError, Result};
pub use index::{BrowseOptions, CacheStatus, MetadataIndex, SortOrder, SyncReport};
pub use links::LinkResolver;
pub use model::{
    CachedAttachment, CachedContent, IndexedFile, PendingChange, PendingKind, PendingOperation,
    Sequence, VaultBoundary,
};
pub use pending::PendingQueue;
pub use reader::{Note, VaultReader};
pub use remote::{InMemoryRemote, ListPage, ListRequest, RemoteError, RemoteItem, RemoteSource};
pub use store::{Record, Store, StoreError, Table};
