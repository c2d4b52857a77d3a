//! Engine control surface — status snapshots, cancellation, shutdown.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{ChannelId, EngineStatus, Status};

use super::DiscordDownloader;

/// How long shutdown waits for in-flight sessions to observe cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

impl DiscordDownloader {
    /// Snapshot of currently active and queued tasks
    ///
    /// Terminal tasks are retained internally for duplicate detection but
    /// excluded from the snapshot.
    pub async fn status(&self) -> EngineStatus {
        let tasks = self.sessions.tasks.lock().await;

        let mut status = EngineStatus::default();
        for task in tasks.values() {
            match task.status {
                Status::Downloading => status.active.push(task.clone()),
                Status::Pending => status.queued.push(task.clone()),
                Status::Completed | Status::Failed => {}
            }
        }

        // Stable ordering for callers that render the lists.
        status.active.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));
        status.queued.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));
        status
    }

    /// Cancel one session by channel id
    ///
    /// Signals the session's cancellation token; the session observes it at
    /// its next check and resolves with an `Event::Cancelled`. Returns
    /// [`Error::NotFound`] if no session for the channel is queued or active.
    pub async fn cancel(&self, channel_id: &ChannelId) -> Result<()> {
        let active = self.sessions.active.lock().await;
        match active.get(channel_id) {
            Some(token) => {
                tracing::info!(channel_id = %channel_id, "Cancelling download");
                token.cancel();
                Ok(())
            }
            None => Err(Error::NotFound(format!(
                "no active download for channel {}",
                channel_id
            ))),
        }
    }

    /// Cancel every queued and active session
    pub async fn cancel_all(&self) {
        let active = self.sessions.active.lock().await;
        tracing::info!(count = active.len(), "Cancelling all downloads");
        for token in active.values() {
            token.cancel();
        }
    }

    /// Graceful shutdown: stop accepting work, cancel everything, and wait
    /// for sessions to resolve
    ///
    /// Subsequent [`download`](Self::download) calls fail with
    /// [`Error::ShuttingDown`]. Sessions that do not resolve within the
    /// grace period are abandoned (their spawned tasks die with the
    /// runtime).
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down download engine");
        self.sessions.accepting_new.store(false, Ordering::SeqCst);
        self.cancel_all().await;

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        loop {
            if self.sessions.active.lock().await.is_empty() {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                let leftover = self.sessions.active.lock().await.len();
                tracing::warn!(leftover, "Shutdown grace period expired with sessions active");
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        tracing::info!("Download engine stopped");
    }
}
