//! Per-message metadata records.
//!
//! When a task has `save_metadata` enabled, the walker writes one pretty-
//! printed JSON record per message into a `messages/` subfolder of the
//! channel's output directory, keyed by message id. Re-archiving a channel
//! overwrites records in place, so the operation is idempotent.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::discord::Message;
use crate::error::Result;
use crate::types::MessageId;
use crate::utils::sanitize_name;

/// One archived attachment reference inside a [`MessageRecord`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttachmentRecord {
    /// Filename as uploaded
    pub filename: String,
    /// CDN URL the bytes were fetched from
    pub url: String,
    /// Declared size in bytes
    pub size: Option<u64>,
    /// Where the attachment is saved, relative to the channel's output
    /// folder, so records stay portable when the tree is moved
    pub local_path: String,
}

/// One archived message, written as `messages/<id>.json`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Message id
    pub id: MessageId,
    /// Text content (may be empty)
    pub content: String,
    /// Author object, passed through verbatim from the API
    pub author: serde_json::Value,
    /// ISO-8601 timestamp string, passed through verbatim
    pub timestamp: String,
    /// Attachments referenced by the message
    pub attachments: Vec<AttachmentRecord>,
    /// Embed list, passed through verbatim
    pub embeds: Vec<serde_json::Value>,
}

impl MessageRecord {
    /// Build a record from a wire message
    ///
    /// Attachment paths are recorded relative to the channel's output
    /// folder.
    pub(crate) fn from_message(message: &Message) -> Self {
        let attachments = message
            .attachments
            .iter()
            .map(|att| AttachmentRecord {
                filename: att.filename.clone(),
                url: att.url.clone(),
                size: att.size,
                local_path: sanitize_name(&att.filename),
            })
            .collect();

        Self {
            id: message.id.clone(),
            content: message.content.clone(),
            author: message.author.clone(),
            timestamp: message.timestamp.clone(),
            attachments,
            embeds: message.embeds.clone(),
        }
    }
}

/// Target path for an attachment within a channel's output folder
pub(crate) fn attachment_path(folder: &Path, filename: &str) -> PathBuf {
    folder.join(sanitize_name(filename))
}

/// Write the record as pretty JSON to `<folder>/messages/<id>.json`
///
/// The `messages/` subfolder is created on first use. Existing records are
/// overwritten.
pub(crate) async fn write_message_record(folder: &Path, record: &MessageRecord) -> Result<()> {
    let dir = folder.join("messages");
    tokio::fs::create_dir_all(&dir).await?;

    let json = serde_json::to_vec_pretty(record)?;
    let path = dir.join(format!("{}.json", record.id));
    tokio::fs::write(&path, json).await?;

    Ok(())
}
