//! Error types for discord-dl
//!
//! The taxonomy distinguishes failures that are fatal to a download session
//! (listing calls returning non-success, cancellation) from failures that are
//! recovered locally (individual attachment fetches, checkpoint I/O). The
//! latter never surface through these types — they are logged at the call
//! site and swallowed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for discord-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for discord-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download_dir")
        key: Option<String>,
    },

    /// Upstream API returned a non-success status on a required call
    #[error("API error: {context}: {status}")]
    Api {
        /// The HTTP status code returned by the upstream API
        status: u16,
        /// What was being fetched when the status was returned
        context: String,
    },

    /// Network-level error (connect failure, timeout, TLS, ...)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested resource does not exist (channel, guild, forum, session)
    #[error("not found: {0}")]
    NotFound(String),

    /// A session for this channel is already active or queued
    #[error("duplicate download: {0}")]
    Duplicate(String),

    /// Session was cancelled cooperatively
    ///
    /// Not a true failure: the session still resolves as failed, but owners
    /// receive a distinct [`Event::Cancelled`](crate::types::Event::Cancelled)
    /// so they can present it differently.
    #[error("download cancelled")]
    Cancelled,

    /// Shutdown in progress - not accepting new downloads
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Machine-readable error code for owners relaying errors onward
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Api { .. } => "api_error",
            Error::Network(_) => "network_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::NotFound(_) => "not_found",
            Error::Duplicate(_) => "duplicate",
            Error::Cancelled => "cancelled",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }

    /// True for the cancellation outcome, which owners must distinguish
    /// from a genuine failure when presenting terminal results.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Terminal outcome of a download session, as relayed to owners
///
/// Serializable so thin API layers can pass it through verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    /// Machine-readable error code ("cancelled", "api_error", ...)
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl From<&Error> for SessionOutcome {
    fn from(error: &Error) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}
