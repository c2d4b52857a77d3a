//! Core download engine split into focused submodules.
//!
//! The `DiscordDownloader` struct and its methods are organized by domain:
//! - [`control`] - Engine control surface (status/cancel/shutdown)
//! - [`session`] - Session lifecycle and terminal event emission
//! - [`walker`] - Channel history walking and attachment fetching
//! - [`forum`] - Forum expansion into per-thread walks
//! - [`archive`] - Per-message metadata records

mod archive;
mod control;
mod forum;
mod session;
mod walker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use archive::{AttachmentRecord, MessageRecord};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::discord::DiscordClient;
use crate::error::{Error, Result};
use crate::state::CheckpointStore;
use crate::types::{ChannelId, DownloadTask, Event, Status};

/// Session bookkeeping shared across engine clones
#[derive(Clone)]
pub(crate) struct SessionState {
    /// Cancellation token per non-terminal session (queued or downloading)
    pub(crate) active: Arc<tokio::sync::Mutex<HashMap<ChannelId, CancellationToken>>>,
    /// Latest task snapshot per channel, including terminal ones
    pub(crate) tasks: Arc<tokio::sync::Mutex<HashMap<ChannelId, DownloadTask>>>,
    /// Semaphore to limit concurrent sessions (respects max_concurrent_sessions config)
    pub(crate) concurrent_limit: Arc<tokio::sync::Semaphore>,
    /// Flag to indicate whether new downloads are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

/// Main download engine (cloneable - all fields are Arc-wrapped)
///
/// One instance owns the HTTP client, the checkpoint store, and the event
/// broadcast channel; sessions are spawned tasks holding a clone.
#[derive(Clone)]
pub struct DiscordDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Upstream REST client, shared so all sessions reuse one connection pool
    pub(crate) client: Arc<DiscordClient>,
    /// Resume checkpoint store backed by the configured state file
    pub(crate) store: Arc<CheckpointStore>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Session bookkeeping
    pub(crate) sessions: SessionState,
}

impl DiscordDownloader {
    /// Create a new engine from configuration
    ///
    /// Ensures the download directory exists, builds the shared HTTP client,
    /// and sets up the event broadcast channel.
    pub async fn new(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(config.download_dir())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "failed to create download directory {}: {}",
                        config.download_dir().display(),
                        e
                    ),
                ))
            })?;

        let client = DiscordClient::new(&config.api, config.retry.clone())?;
        let store = CheckpointStore::new(config.state_file());
        let (event_tx, _) = tokio::sync::broadcast::channel(1000);
        let max_concurrent = config.download.max_concurrent_sessions.max(1);

        Ok(Self {
            config: Arc::new(config),
            client: Arc::new(client),
            store: Arc::new(store),
            event_tx,
            sessions: SessionState {
                active: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
                tasks: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
                concurrent_limit: Arc::new(tokio::sync::Semaphore::new(max_concurrent)),
                accepting_new: Arc::new(AtomicBool::new(true)),
            },
        })
    }

    /// Subscribe to engine events
    ///
    /// Every subscriber gets its own receiver; slow subscribers lag rather
    /// than block the engine.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Check whether the configured token is accepted by the API
    pub async fn validate_token(&self) -> bool {
        self.client.validate_token().await
    }

    /// Check whether the token's account is a member of the given guild
    pub async fn is_member(&self, guild_id: &crate::types::GuildId) -> bool {
        self.client.is_member(guild_id).await
    }

    /// Submit a download task
    ///
    /// The task is accepted (emitting [`Event::Queued`]) and a session is
    /// spawned to run it. Rejected with [`Error::ShuttingDown`] after
    /// [`shutdown`](Self::shutdown) has begun, and with [`Error::Duplicate`]
    /// while another session for the same channel is still queued or running.
    pub async fn download(&self, task: DownloadTask) -> Result<()> {
        if !self.sessions.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let channel_id = task.channel_id.clone();
        let token = CancellationToken::new();

        {
            let mut tasks = self.sessions.tasks.lock().await;
            if let Some(existing) = tasks.get(&channel_id) {
                if !existing.status.is_terminal() {
                    return Err(Error::Duplicate(format!(
                        "channel {} already has an active download",
                        channel_id
                    )));
                }
            }

            let mut accepted = task.clone();
            accepted.status = Status::Pending;
            tasks.insert(channel_id.clone(), accepted);

            self.sessions
                .active
                .lock()
                .await
                .insert(channel_id.clone(), token.clone());
        }

        tracing::info!(
            channel_id = %channel_id,
            channel_name = %task.channel_name,
            kind = ?task.kind,
            "Download queued"
        );
        self.emit_event(Event::Queued {
            channel_id: channel_id.clone(),
            channel_name: task.channel_name.clone(),
        });

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_session(task, token).await;
        });

        Ok(())
    }

    /// Send an event to all subscribers (no-op if nobody is listening)
    pub(crate) fn emit_event(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }
}
