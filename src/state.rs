//! Resume checkpoint store
//!
//! Durable mapping from channel id to the last-processed message id and
//! counters, persisted as a single JSON file (`download_state.json` by
//! default). A session checkpoints on every progress event so an
//! interrupted run can resume pagination instead of starting over.
//!
//! Every operation is best-effort: a corrupted or unwritable state file must
//! never crash a download, only disable resumption for that run. Failures
//! are logged and reported as "no state available".
//!
//! The file is shared process-wide across concurrent sessions, so every
//! read-modify-write cycle runs under the store's internal mutex.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::types::{ChannelId, MessageId};

/// Checkpoints older than this are treated as absent.
const STALENESS_WINDOW_HOURS: i64 = 24;

/// Per-channel resume state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Pagination cursor: the next listing request pages before this id
    pub last_message_id: MessageId,
    /// Attachments successfully written so far
    pub downloaded_files: u64,
    /// Attachments seen so far
    pub total_files: u64,
    /// When this checkpoint was written
    pub timestamp: DateTime<Utc>,
}

/// On-disk shape: the whole mapping serialized as one unit with a top-level
/// timestamp used for the staleness check.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    timestamp: DateTime<Utc>,
    downloads: HashMap<ChannelId, Checkpoint>,
}

/// Durable checkpoint store backed by a single JSON file
///
/// Cloneable-by-Arc at the engine level; the internal mutex serializes all
/// file access so two concurrently checkpointing sessions cannot lose each
/// other's updates.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CheckpointStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Load the full checkpoint mapping
    ///
    /// Returns `None` when the file is missing, unreadable, corrupt, or its
    /// top-level timestamp is older than 24 hours — all treated identically
    /// to a first run.
    pub async fn load(&self) -> Option<HashMap<ChannelId, Checkpoint>> {
        let _guard = self.lock.lock().await;
        self.read_state().await.map(|state| state.downloads)
    }

    /// Look up one channel's checkpoint, if present and not stale
    pub async fn checkpoint_for(&self, channel_id: &ChannelId) -> Option<Checkpoint> {
        let _guard = self.lock.lock().await;
        self.read_state()
            .await
            .and_then(|mut state| state.downloads.remove(channel_id))
    }

    /// Replace the entire mapping, stamping a fresh top-level timestamp
    pub async fn save(&self, downloads: HashMap<ChannelId, Checkpoint>) {
        let _guard = self.lock.lock().await;
        self.write_state(downloads).await;
    }

    /// Merge one channel's checkpoint into the existing mapping
    ///
    /// Read-modify-write under the store lock; other channels' entries are
    /// preserved.
    pub async fn update(&self, channel_id: ChannelId, checkpoint: Checkpoint) {
        let _guard = self.lock.lock().await;
        let mut downloads = self
            .read_state()
            .await
            .map(|state| state.downloads)
            .unwrap_or_default();
        downloads.insert(channel_id, checkpoint);
        self.write_state(downloads).await;
    }

    /// Remove all stored state unconditionally
    pub async fn clear(&self) {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to clear download state"
                );
            }
        }
    }

    // Callers must hold `self.lock`.
    async fn read_state(&self) -> Option<PersistedState> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read download state"
                );
                return None;
            }
        };

        let state: PersistedState = match serde_json::from_slice(&contents) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Download state file is corrupt, ignoring"
                );
                return None;
            }
        };

        let age = Utc::now() - state.timestamp;
        if age > Duration::hours(STALENESS_WINDOW_HOURS) {
            tracing::info!(
                path = %self.path.display(),
                age_hours = age.num_hours(),
                "Download state is stale, starting fresh"
            );
            return None;
        }

        Some(state)
    }

    // Callers must hold `self.lock`.
    async fn write_state(&self, downloads: HashMap<ChannelId, Checkpoint>) {
        let state = PersistedState {
            timestamp: Utc::now(),
            downloads,
        };

        let json = match serde_json::to_vec_pretty(&state) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize download state");
                return;
            }
        };

        if let Err(e) = tokio::fs::write(&self.path, json).await {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to save download state"
            );
        }
    }
}
