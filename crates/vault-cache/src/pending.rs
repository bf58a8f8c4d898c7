//! Durable queue of local changes awaiting write-back.
//!
//! Nothing here talks to the remote. Operations are recorded so that a
//! write-back component can replay them later.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::model::{PendingChange, PendingOperation, Sequence, pending_key};
use crate::store::Store;

/// Sequence row holding the last issued operation id.
const PENDING_SEQUENCE: &str = "pending_ops";

pub struct PendingQueue {
    store: Arc<Store>,
    /// Serializes id allocation with the insert that uses it
    enqueue_lock: Mutex<()>,
}

impl PendingQueue {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            enqueue_lock: Mutex::new(()),
        }
    }

    /// Queue a change. Returns the operation's id.
    ///
    /// Ids are never reused, even after the newest operation is removed.
    pub async fn enqueue(&self, remote_id: &str, change: PendingChange) -> Result<u64> {
        let _guard = self.enqueue_lock.lock().await;

        // Rows queued before the sequence existed still count toward the mark
        let highest_queued = self.store.pending.all().await.iter().map(|op| op.id).max().unwrap_or(0);
        let last_issued = self
            .store
            .sequences
            .get(PENDING_SEQUENCE)
            .await
            .map_or(0, |seq| seq.last_issued);
        let id = highest_queued.max(last_issued) + 1;

        self.store
            .sequences
            .put(Sequence {
                name: PENDING_SEQUENCE.to_string(),
                last_issued: id,
            })
            .await?;

        debug!(id, remote_id, kind = %change.kind(), "Queued pending operation");
        self.store
            .pending
            .put(PendingOperation {
                id,
                remote_id: remote_id.to_string(),
                change,
                timestamp: Utc::now(),
                retry_count: 0,
            })
            .await?;

        Ok(id)
    }

    /// Queued operations, oldest first.
    pub async fn list(&self) -> Vec<PendingOperation> {
        let mut ops = self.store.pending.all().await;
        ops.sort_by_key(|op| op.id);
        ops
    }

    /// Bump an operation's retry count. Returns the new count, or None if it is gone.
    pub async fn record_retry(&self, id: u64) -> Result<Option<u32>> {
        let Some(mut op) = self.store.pending.get(&pending_key(id)).await else {
            return Ok(None);
        };
        op.retry_count += 1;
        let count = op.retry_count;
        self.store.pending.put(op).await?;
        Ok(Some(count))
    }

    /// Drop an operation. Returns whether it was queued.
    pub async fn remove(&self, id: u64) -> Result<bool> {
        Ok(self.store.pending.delete(&pending_key(id)).await?)
    }
}
