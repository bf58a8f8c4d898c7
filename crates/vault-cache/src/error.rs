//! Errors surfaced by the cache components.

use thiserror::Error;

use crate::remote::RemoteError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No vault selected")]
    NoVaultSelected,
}

impl CacheError {
    /// Whether the user must sign in again before the remote can be reached.
    pub fn is_auth_required(&self) -> bool {
        matches!(self, CacheError::Remote(RemoteError::AuthRequired))
    }

    /// Whether the remote reported the item as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::Remote(RemoteError::NotFound(_)))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
