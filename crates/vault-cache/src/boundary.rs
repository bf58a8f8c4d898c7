//! Vault boundary: the single active root that all paths are relative to.
//!
//! Switching to a different root or clearing the selection wipes the
//! metadata index and the content cache. Attachments are wiped too unless
//! [`CacheConfig::retain_attachments_across_vaults`] is set.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::model::{BOUNDARY_KEY, VaultBoundary};
use crate::store::Store;

/// The selected vault, or [`CacheError::NoVaultSelected`].
pub(crate) async fn current_root(store: &Store) -> Result<VaultBoundary> {
    store
        .boundary
        .get(BOUNDARY_KEY)
        .await
        .ok_or(CacheError::NoVaultSelected)
}

pub struct VaultSelection {
    store: Arc<Store>,
    config: CacheConfig,
}

impl VaultSelection {
    pub fn new(store: Arc<Store>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// The active vault, if one is selected.
    pub async fn current(&self) -> Option<VaultBoundary> {
        self.store.boundary.get(BOUNDARY_KEY).await
    }

    /// Make `root_path` the active vault.
    ///
    /// Reselecting the current root (same `root_id`) keeps every cache;
    /// any other selection starts from empty tables.
    pub async fn select(&self, root_path: &str, root_name: &str, root_id: &str) -> Result<VaultBoundary> {
        let previous = self.current().await;
        let same_root = previous.as_ref().is_some_and(|p| p.root_id == root_id);

        if !same_root {
            self.invalidate().await?;
        }

        let boundary = VaultBoundary {
            root_path: root_path.trim_matches('/').to_string(),
            root_name: root_name.to_string(),
            root_id: root_id.to_string(),
            selected_at: Utc::now(),
        };
        self.store.boundary.put(boundary.clone()).await?;

        match previous {
            Some(p) if same_root => info!("Reselected vault {}", p.root_name),
            Some(p) => info!("Switched vault from {} to {}", p.root_name, boundary.root_name),
            None => info!("Selected vault {}", boundary.root_name),
        }

        Ok(boundary)
    }

    /// Deselect the vault and wipe the caches tied to it.
    pub async fn clear(&self) -> Result<()> {
        self.store.boundary.delete(BOUNDARY_KEY).await?;
        self.invalidate().await?;
        info!("Cleared vault selection");
        Ok(())
    }

    /// Wipe every cache table but keep the vault selected.
    pub async fn clear_cache(&self) -> Result<()> {
        self.store.files.clear().await?;
        self.store.content.clear().await?;
        self.store.attachments.clear().await?;
        info!("Cleared all cached data");
        Ok(())
    }

    async fn invalidate(&self) -> Result<()> {
        self.store.files.clear().await?;
        self.store.content.clear().await?;
        if !self.config.retain_attachments_across_vaults {
            self.store.attachments.clear().await?;
        }
        Ok(())
    }
}
