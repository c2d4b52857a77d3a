//! Forum expansion.
//!
//! A forum task fans out into one walk per thread: every forum channel in
//! the guild is discovered by type code, its active and archived threads are
//! listed, and each thread is walked like a regular channel into a nested
//! output folder (`<forum name>/<thread name>`, both sanitized).
//!
//! Counters accumulate across threads so progress reports describe the whole
//! forum task, not the current thread. Resume cursors do not apply here — a
//! single cursor cannot address a position across many threads — so a
//! resumed forum task re-walks its threads from the top.

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::DownloadTask;
use crate::utils::sanitize_name;

use super::DiscordDownloader;
use super::walker::{ProgressSink, Walk};

impl DiscordDownloader {
    /// Expand a forum task and walk every thread of every forum channel
    pub(crate) async fn download_forum(
        &self,
        task: &DownloadTask,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<()> {
        let forums = self.client.list_forum_channels(&task.guild_id).await?;
        if forums.is_empty() {
            return Err(Error::NotFound(format!(
                "no forum channels found in guild {}",
                task.guild_id
            )));
        }

        tracing::info!(
            guild_id = %task.guild_id,
            forums = forums.len(),
            "Expanding forum download"
        );

        let mut downloaded = 0u64;
        let mut total = 0u64;

        for forum in &forums {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // A thread is either active or archived, never both, so the two
            // listings concatenate without dedup.
            let mut threads = self.client.list_active_threads(&forum.id).await?;
            threads.extend(self.client.list_archived_threads(&forum.id).await?);

            tracing::info!(
                forum_id = %forum.id,
                forum_name = %forum.name,
                threads = threads.len(),
                "Walking forum threads"
            );

            let forum_dir = self
                .config
                .download_dir()
                .join(sanitize_name(&forum.name));

            for thread in &threads {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }

                let thread_dir = forum_dir.join(sanitize_name(&thread.name));
                // Progress lines name the owning forum, not just the thread.
                let display_name = format!("{}/{}", forum.name, thread.name);
                let (d, t) = self
                    .walk_channel(
                        Walk {
                            channel_id: &thread.id,
                            display_name: &display_name,
                            folder: &thread_dir,
                            save_metadata: task.save_metadata,
                            resume_cursor: None,
                            downloaded,
                            total,
                        },
                        cancel,
                        sink,
                    )
                    .await?;
                downloaded = d;
                total = t;
            }
        }

        Ok(())
    }
}
