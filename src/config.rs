//! Configuration types for discord-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upstream API configuration (endpoint, credentials, request behavior)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the Discord REST API (default: "https://discord.com/api/v9")
    ///
    /// Overridable so tests and proxies can point the engine elsewhere.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token attached as the `Authorization` header on every request
    ///
    /// Acquisition and validation are the caller's concern; the engine
    /// treats the token as opaque.
    #[serde(default)]
    pub token: String,

    /// User-Agent header value (default: "Mozilla/5.0")
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout (default: 30 seconds)
    ///
    /// Applies to every listing and attachment request; a hung connection
    /// fails the request rather than stalling the session.
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            user_agent: default_user_agent(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Download behavior configuration (output directory, concurrency)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root output directory (default: "./DOWNLOADS")
    ///
    /// One subfolder per sanitized channel name is created beneath it.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum concurrent download sessions (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_sessions: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_sessions: default_max_concurrent(),
        }
    }
}

/// Data storage and state management configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path of the resume checkpoint file (default: "download_state.json")
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

/// Retry configuration for transient upstream failures
///
/// Applies to listing and attachment GETs; 429 and 5xx responses and
/// connect/timeout errors are retried with exponential backoff. Set
/// `max_attempts` to 0 to disable retries entirely.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Main configuration for [`DiscordDownloader`](crate::downloader::DiscordDownloader)
///
/// All fields have sensible defaults except the bearer token, which the
/// caller must supply for any real use.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream API settings (endpoint, token, timeout)
    #[serde(default)]
    pub api: ApiConfig,

    /// Download behavior settings (output directory, concurrency)
    #[serde(default)]
    pub download: DownloadConfig,

    /// Data storage and state management
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Retry behavior for transient upstream failures
    #[serde(default)]
    pub retry: RetryConfig,
}

// Convenience accessors for the most commonly reached-for settings.
impl Config {
    /// Root output directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Resume checkpoint file path
    pub fn state_file(&self) -> &PathBuf {
        &self.persistence.state_file
    }
}

fn default_base_url() -> String {
    "https://discord.com/api/v9".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./DOWNLOADS")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_state_file() -> PathBuf {
    PathBuf::from("download_state.json")
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
