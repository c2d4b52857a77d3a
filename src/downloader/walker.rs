//! Channel history walker and attachment fetcher.
//!
//! Walks one channel's full message history newest-to-oldest in pages of
//! 100, fetching every attachment it encounters. Listing failures are fatal
//! for the channel; individual attachment failures are soft — logged,
//! counted in `total`, and skipped. Progress is reported once per
//! successfully fetched attachment, carrying the last completed page
//! boundary as the resume position.
//!
//! Cancellation is checked before every page and every message, and also
//! interrupts in-flight requests, so a cancelled session stops promptly
//! instead of finishing the current page.

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::{ChannelId, MessageId, PageBoundary, Progress};
use crate::utils::format_file_size;

use super::DiscordDownloader;
use super::archive::{self, MessageRecord};

/// Receiver for walker progress reports
///
/// The session side of this seam persists a checkpoint and fans the report
/// out to event subscribers; the walker only counts and calls.
#[async_trait]
pub(crate) trait ProgressSink: Send + Sync {
    /// Report progress after one attachment has been successfully processed
    async fn report(&self, progress: Progress);
}

/// Parameters for walking one channel or thread
pub(crate) struct Walk<'a> {
    /// Channel or thread to walk
    pub channel_id: &'a ChannelId,
    /// Display name used in progress messages
    pub display_name: &'a str,
    /// Output folder for attachments (created if absent)
    pub folder: &'a Path,
    /// Write one JSON record per message
    pub save_metadata: bool,
    /// Pagination cursor to resume from, if any
    pub resume_cursor: Option<MessageId>,
    /// Counter seeds carried over from a checkpoint or a previous thread
    pub downloaded: u64,
    /// Counter seed for attachments seen
    pub total: u64,
}

impl DiscordDownloader {
    /// Walk a channel's history and fetch every attachment
    ///
    /// Returns the final `(downloaded, total)` counters on success so forum
    /// sessions can thread them through consecutive walks.
    pub(crate) async fn walk_channel(
        &self,
        walk: Walk<'_>,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<(u64, u64)> {
        tokio::fs::create_dir_all(walk.folder).await?;

        let mut downloaded = walk.downloaded;
        let mut total = walk.total;
        let mut before = walk.resume_cursor;
        let mut pages = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // The resume position is the boundary behind the page now in
            // flight; a crash mid-page re-fetches this page, never skips it.
            let boundary = before.clone().map(|id| PageBoundary {
                last_message_id: id,
                downloaded,
                total,
            });

            let page = tokio::select! {
                page = self.client.list_messages(walk.channel_id, before.as_ref()) => page?,
                () = cancel.cancelled() => return Err(Error::Cancelled),
            };
            if page.is_empty() {
                break;
            }
            pages += 1;

            for message in &page {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }

                if walk.save_metadata {
                    let record = MessageRecord::from_message(message);
                    if let Err(e) = archive::write_message_record(walk.folder, &record).await {
                        tracing::warn!(
                            channel_id = %walk.channel_id,
                            message_id = %message.id,
                            error = %e,
                            "Failed to write message record, continuing"
                        );
                    }
                }

                for attachment in &message.attachments {
                    total += 1;

                    let fetched = tokio::select! {
                        res = self.fetch_and_store(walk.folder, &attachment.url, &attachment.filename) => res,
                        () = cancel.cancelled() => return Err(Error::Cancelled),
                    };

                    match fetched {
                        Ok(written) => {
                            downloaded += 1;
                            tracing::debug!(
                                channel_id = %walk.channel_id,
                                filename = %attachment.filename,
                                size = %format_file_size(written),
                                "Attachment saved"
                            );

                            sink.report(Progress {
                                downloaded,
                                total,
                                message: format!(
                                    "{}: {}",
                                    walk.display_name, attachment.filename
                                ),
                                completed_page: boundary.clone(),
                            })
                            .await;
                        }
                        Err(e) => {
                            tracing::warn!(
                                channel_id = %walk.channel_id,
                                message_id = %message.id,
                                filename = %attachment.filename,
                                error = %e,
                                "Failed to download attachment, skipping"
                            );
                        }
                    }
                }
            }

            // Pages arrive newest-first, so the last entry is the oldest and
            // becomes the cursor for the next page.
            if let Some(oldest) = page.last() {
                before = Some(oldest.id.clone());
            }
        }

        tracing::info!(
            channel_id = %walk.channel_id,
            channel_name = %walk.display_name,
            pages,
            downloaded,
            total,
            "Channel walk finished"
        );

        Ok((downloaded, total))
    }

    /// Fetch one attachment and write it to disk in a single operation
    ///
    /// Returns the number of bytes written.
    async fn fetch_and_store(&self, folder: &Path, url: &str, filename: &str) -> Result<u64> {
        let bytes = self.client.fetch_attachment(url).await?;
        let path = archive::attachment_path(folder, filename);
        let len = bytes.len() as u64;
        tokio::fs::write(&path, bytes).await?;
        Ok(len)
    }
}
