//! Session lifecycle.
//!
//! One session per submitted task: waits for the scheduled time (if any),
//! transitions the task to downloading, dispatches to the channel walker or
//! forum expander, and resolves with exactly one terminal event. Cancellation
//! resolves the task as failed but emits a distinct `Cancelled` event so
//! owners can tell the two apart.
//!
//! The checkpoint file is cleared whenever a session reaches a terminal
//! state, including failure — a failed run starts over rather than resuming
//! into a channel whose history may have changed underneath it.

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::state::Checkpoint;
use crate::types::{ChannelId, ChannelKind, DownloadTask, Event, Progress, Status};
use crate::utils::sanitize_name;

use super::walker::{ProgressSink, Walk};
use super::DiscordDownloader;

/// Session-side progress receiver
///
/// Updates the engine's task snapshot, persists a resume checkpoint, and
/// fans the report out to event subscribers.
struct SessionProgress {
    engine: DiscordDownloader,
    channel_id: ChannelId,
}

#[async_trait]
impl ProgressSink for SessionProgress {
    async fn report(&self, progress: Progress) {
        {
            let mut tasks = self.engine.sessions.tasks.lock().await;
            if let Some(task) = tasks.get_mut(&self.channel_id) {
                task.downloaded_files = progress.downloaded;
                task.total_files = progress.total;
                task.progress = if progress.total > 0 {
                    progress.downloaded as f32 / progress.total as f32
                } else {
                    0.0
                };
            }
        }

        // Only a completed page boundary is safe to resume from; there is
        // nothing to persist while the first page is in flight.
        if let Some(page) = &progress.completed_page {
            self.engine
                .store
                .update(
                    self.channel_id.clone(),
                    Checkpoint {
                        last_message_id: page.last_message_id.clone(),
                        downloaded_files: page.downloaded,
                        total_files: page.total,
                        timestamp: Utc::now(),
                    },
                )
                .await;
        }

        self.engine.emit_event(Event::Progress {
            channel_id: self.channel_id.clone(),
            downloaded: progress.downloaded,
            total: progress.total,
            message: progress.message,
        });
    }
}

impl DiscordDownloader {
    /// Run one download session to completion
    ///
    /// Spawned by [`download`](Self::download); never returns an error —
    /// every outcome is reported through the task snapshot and the event
    /// channel.
    pub(crate) async fn run_session(&self, task: DownloadTask, cancel: CancellationToken) {
        let channel_id = task.channel_id.clone();
        let result = self.run_session_inner(&task, &cancel).await;

        // Terminal cleanup: the session is over, resume state no longer
        // applies to any outcome.
        self.store.clear().await;

        {
            let mut tasks = self.sessions.tasks.lock().await;
            if let Some(snapshot) = tasks.get_mut(&channel_id) {
                snapshot.status = match result {
                    Ok(()) => Status::Completed,
                    Err(_) => Status::Failed,
                };
            }
        }
        self.sessions.active.lock().await.remove(&channel_id);

        match result {
            Ok(()) => {
                tracing::info!(channel_id = %channel_id, "Download completed");
                self.emit_event(Event::Completed {
                    channel_id,
                    channel_name: task.channel_name,
                });
            }
            Err(e) if e.is_cancelled() => {
                tracing::info!(channel_id = %channel_id, "Download cancelled");
                self.emit_event(Event::Cancelled { channel_id });
            }
            Err(e) => {
                tracing::error!(channel_id = %channel_id, error = %e, "Download failed");
                self.emit_event(Event::Failed {
                    channel_id,
                    error: e.to_string(),
                });
            }
        }
    }

    async fn run_session_inner(
        &self,
        task: &DownloadTask,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.wait_for_schedule(task, cancel).await?;

        // Respect the concurrency cap; queued sessions stay cancellable
        // while they wait for a permit.
        let permit = tokio::select! {
            permit = self.sessions.concurrent_limit.clone().acquire_owned() => {
                permit.map_err(|_| Error::ShuttingDown)?
            }
            () = cancel.cancelled() => return Err(Error::Cancelled),
        };
        let _permit = permit;

        {
            let mut tasks = self.sessions.tasks.lock().await;
            if let Some(snapshot) = tasks.get_mut(&task.channel_id) {
                snapshot.status = Status::Downloading;
            }
        }
        self.emit_event(Event::Started {
            channel_id: task.channel_id.clone(),
        });

        let sink = SessionProgress {
            engine: self.clone(),
            channel_id: task.channel_id.clone(),
        };

        match task.kind {
            ChannelKind::Forum => self.download_forum(task, cancel, &sink).await,
            ChannelKind::Text | ChannelKind::Thread => {
                let checkpoint = self.store.checkpoint_for(&task.channel_id).await;
                if let Some(cp) = &checkpoint {
                    tracing::info!(
                        channel_id = %task.channel_id,
                        cursor = %cp.last_message_id,
                        downloaded = cp.downloaded_files,
                        total = cp.total_files,
                        "Resuming from checkpoint"
                    );
                }

                let folder = self
                    .config
                    .download_dir()
                    .join(sanitize_name(&task.channel_name));

                self.walk_channel(
                    Walk {
                        channel_id: &task.channel_id,
                        display_name: &task.channel_name,
                        folder: &folder,
                        save_metadata: task.save_metadata,
                        resume_cursor: checkpoint.as_ref().map(|cp| cp.last_message_id.clone()),
                        downloaded: checkpoint.as_ref().map_or(0, |cp| cp.downloaded_files),
                        total: checkpoint.as_ref().map_or(0, |cp| cp.total_files),
                    },
                    cancel,
                    &sink,
                )
                .await
                .map(|_| ())
            }
        }
    }

    /// Sleep until the task's scheduled time, if it has one in the future
    async fn wait_for_schedule(
        &self,
        task: &DownloadTask,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(scheduled) = task.scheduled_time else {
            return Ok(());
        };

        let delay = (scheduled - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        if delay.is_zero() {
            return Ok(());
        }

        tracing::info!(
            channel_id = %task.channel_id,
            scheduled = %scheduled,
            "Waiting for scheduled start time"
        );

        tokio::select! {
            () = tokio::time::sleep(delay) => Ok(()),
            () = cancel.cancelled() => Err(Error::Cancelled),
        }
    }
}
