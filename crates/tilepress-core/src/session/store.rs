//! The seam to the caller-owned photo records.
//!
//! The session never mutates photo records directly. Every change leaves as
//! an [`EditPatch`] through [`RecordStore`], so the hosting application stays
//! the source of truth for its own data. In-progress UI state is persisted
//! through a debounced write-behind task that coalesces rapid updates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::EditPatch;

/// Error surfaced by a record store implementation.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self(e.to_string())
    }
}

/// Applies update patches to the caller's photo records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn apply_patch(&self, asset_id: &str, patch: EditPatch) -> Result<(), StoreError>;
}

/// In-memory store keeping every patch in arrival order. Useful for tests
/// and for embedders that merge patches themselves after the session ends.
#[derive(Default)]
pub struct MemoryStore {
    patches: Mutex<HashMap<String, Vec<EditPatch>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, Vec<EditPatch>>> {
        self.patches.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All patches applied to `asset_id`, oldest first.
    pub fn patches_for(&self, asset_id: &str) -> Vec<EditPatch> {
        self.guard().get(asset_id).cloned().unwrap_or_default()
    }

    /// The most recent patch for `asset_id`.
    pub fn latest(&self, asset_id: &str) -> Option<EditPatch> {
        self.guard().get(asset_id).and_then(|v| v.last().cloned())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn apply_patch(&self, asset_id: &str, patch: EditPatch) -> Result<(), StoreError> {
        self.guard()
            .entry(asset_id.to_string())
            .or_default()
            .push(patch);
        Ok(())
    }
}

/// Spawn the write-behind task for in-progress UI state.
///
/// Updates sent on the returned channel coalesce: the store sees only the
/// newest state once input has been quiet for the debounce window. Closing
/// the channel flushes whatever is still pending before the task exits.
pub(crate) fn spawn_ui_persist(
    store: Arc<dyn RecordStore>,
    debounce: Duration,
) -> mpsc::Sender<(String, EditPatch)> {
    let (tx, mut rx) = mpsc::channel::<(String, EditPatch)>(32);
    tokio::spawn(async move {
        let mut pending: Option<(String, EditPatch)> = None;
        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(update) => pending = Some(update),
                    None => break,
                },
                // Recreated each iteration, so every new update restarts
                // the quiet-period timer.
                _ = tokio::time::sleep(debounce), if pending.is_some() => {
                    if let Some((id, patch)) = pending.take() {
                        if let Err(e) = store.apply_patch(&id, patch).await {
                            tracing::warn!("deferred state save failed for {id}: {e}");
                        }
                    }
                }
            }
        }
        if let Some((id, patch)) = pending.take() {
            if let Err(e) = store.apply_patch(&id, patch).await {
                tracing::warn!("final state save failed for {id}: {e}");
            }
        }
    });
    tx
}
