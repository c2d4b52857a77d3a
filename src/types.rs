//! Core types and events for discord-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a channel or thread (Discord snowflake)
///
/// Snowflakes are kept as strings end to end — they exceed 2^53 and the
/// upstream API transports them as JSON strings.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

/// Unique identifier for a guild (Discord snowflake)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(pub String);

/// Unique identifier for a message (Discord snowflake)
///
/// Doubles as the pagination cursor: a listing request with `before=<id>`
/// returns messages strictly older than this message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

macro_rules! impl_snowflake {
    ($name:ident) => {
        impl $name {
            /// Borrow the inner snowflake string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

impl_snowflake!(ChannelId);
impl_snowflake!(GuildId);
impl_snowflake!(MessageId);

/// Kind of channel a download task targets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Regular text channel
    Text,
    /// Forum channel — expanded into its threads before walking
    Forum,
    /// A single thread (walked like a text channel)
    Thread,
}

/// Download session status
///
/// Transitions: `Pending → Downloading → {Completed, Failed}`. Both
/// `Completed` and `Failed` are terminal; cancellation resolves as `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Submitted but not yet started (possibly waiting for its scheduled time)
    Pending,
    /// Session is actively walking channel history
    Downloading,
    /// Walk finished without error
    Completed,
    /// Walk aborted with an error, or was cancelled
    Failed,
}

impl Status {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

/// A request to archive one channel or forum
///
/// Created by the caller when enqueuing work; the progress fields are
/// mutated only by the download session that owns the task, and read back
/// through [`EngineStatus`] snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadTask {
    /// Channel (or forum, or thread) to archive
    pub channel_id: ChannelId,
    /// Display name, used for the output folder (sanitized)
    pub channel_name: String,
    /// What kind of channel this is
    pub kind: ChannelKind,
    /// Guild the channel belongs to (drives forum expansion)
    pub guild_id: GuildId,
    /// Optional start time; the session sleeps until it is due
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Save one JSON record per message alongside the attachments
    #[serde(default = "default_save_metadata")]
    pub save_metadata: bool,
    /// Current session status
    #[serde(default = "default_status")]
    pub status: Status,
    /// Fraction complete (downloaded / total), 0.0 when nothing counted yet
    #[serde(default)]
    pub progress: f32,
    /// Attachments successfully written to disk
    #[serde(default)]
    pub downloaded_files: u64,
    /// Attachments seen (including fetch failures)
    #[serde(default)]
    pub total_files: u64,
}

fn default_save_metadata() -> bool {
    true
}

fn default_status() -> Status {
    Status::Pending
}

impl DownloadTask {
    /// Create a task with default flags (metadata saving on, no schedule)
    pub fn new(
        channel_id: impl Into<ChannelId>,
        channel_name: impl Into<String>,
        kind: ChannelKind,
        guild_id: impl Into<GuildId>,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            channel_name: channel_name.into(),
            kind,
            guild_id: guild_id.into(),
            scheduled_time: None,
            save_metadata: true,
            status: Status::Pending,
            progress: 0.0,
            downloaded_files: 0,
            total_files: 0,
        }
    }
}

/// One progress report from the channel walker
///
/// Carries the resume position explicitly so the session can checkpoint
/// without parsing the human-readable message.
#[derive(Clone, Debug)]
pub struct Progress {
    /// Attachments successfully written so far (including resumed counts)
    pub downloaded: u64,
    /// Attachments seen so far (including fetch failures)
    pub total: u64,
    /// Human-readable line naming the channel and current file
    pub message: String,
    /// Resume position of the last fully completed page, if any
    ///
    /// `None` while the first page is still in flight; nothing is safe to
    /// checkpoint until a page boundary has been reached.
    pub completed_page: Option<PageBoundary>,
}

/// Resume position marking a page boundary
///
/// Resuming with `before = last_message_id` re-fetches at most the one
/// page that was in flight when the run stopped; re-processing that page
/// is idempotent, so no attachment is ever skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageBoundary {
    /// Cursor: oldest message id of the last completed page
    pub last_message_id: MessageId,
    /// Attachments successfully written as of the boundary
    pub downloaded: u64,
    /// Attachments seen as of the boundary
    pub total: u64,
}

/// Event emitted during the download lifecycle
///
/// Consumers subscribe via
/// [`DiscordDownloader::subscribe`](crate::downloader::DiscordDownloader::subscribe);
/// each session produces progress events and exactly one terminal event
/// (`Completed`, `Failed`, or `Cancelled`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task accepted by the engine
    Queued {
        /// Channel being archived
        channel_id: ChannelId,
        /// Display name of the channel
        channel_name: String,
    },

    /// Session entered the downloading state
    Started {
        /// Channel being archived
        channel_id: ChannelId,
    },

    /// One attachment was processed successfully
    Progress {
        /// Channel being archived
        channel_id: ChannelId,
        /// Attachments successfully written so far
        downloaded: u64,
        /// Attachments seen so far
        total: u64,
        /// Human-readable line naming the channel and current file
        message: String,
    },

    /// Session finished without error
    Completed {
        /// Channel that was archived
        channel_id: ChannelId,
        /// Display name of the channel
        channel_name: String,
    },

    /// Session aborted with an error
    Failed {
        /// Channel whose session failed
        channel_id: ChannelId,
        /// Error text, suitable for display
        error: String,
    },

    /// Session was cancelled by the owner
    ///
    /// The session status is `Failed`, but this is a deliberate outcome, not
    /// a true failure — owners should present it accordingly.
    Cancelled {
        /// Channel whose session was cancelled
        channel_id: ChannelId,
    },
}

/// Snapshot of current engine state, returned by
/// [`DiscordDownloader::status`](crate::downloader::DiscordDownloader::status)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Sessions currently walking channel history
    pub active: Vec<DownloadTask>,
    /// Tasks accepted but still waiting (scheduled time not yet due)
    pub queued: Vec<DownloadTask>,
}
