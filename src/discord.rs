//! Discord REST client and wire models
//!
//! Thin typed wrapper over the upstream HTTP/JSON API. One [`DiscordClient`]
//! is shared per engine so all sessions reuse a single connection pool.
//! Listing calls are retried on transient failures (see [`crate::retry`]);
//! a non-success status on a listing call surfaces as [`Error::Api`].
//!
//! Author and embed payloads are deliberately untyped
//! ([`serde_json::Value`]) — their upstream shape is not controlled by this
//! crate and records pass them through verbatim.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::config::{ApiConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::request_with_retry;
use crate::types::{ChannelId, GuildId, MessageId};

/// Upstream page size cap for message listing
pub const MESSAGE_PAGE_LIMIT: usize = 100;

/// Channel type code identifying forum channels
pub const FORUM_CHANNEL_TYPE: u8 = 15;

/// One message as returned by the listing endpoint
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Message {
    /// Message id (also the pagination cursor)
    pub id: MessageId,
    /// Text content (may be empty)
    #[serde(default)]
    pub content: String,
    /// Author object, passed through opaquely
    #[serde(default)]
    pub author: serde_json::Value,
    /// ISO-8601 timestamp string, passed through opaquely
    #[serde(default)]
    pub timestamp: String,
    /// Embed list, passed through opaquely
    #[serde(default)]
    pub embeds: Vec<serde_json::Value>,
    /// Attachments referenced by this message
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// One attachment descriptor inside a message
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Attachment {
    /// Filename as uploaded
    pub filename: String,
    /// CDN URL the raw bytes can be fetched from
    pub url: String,
    /// Declared size in bytes
    #[serde(default)]
    pub size: Option<u64>,
}

/// A guild channel or thread (read-only, never persisted)
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GuildChannel {
    /// Channel id
    pub id: ChannelId,
    /// Channel name
    #[serde(default)]
    pub name: String,
    /// Numeric channel type code (15 = forum)
    #[serde(rename = "type", default)]
    pub kind: u8,
    /// Parent channel id (category, or owning forum for threads)
    #[serde(default)]
    pub parent_id: Option<ChannelId>,
    /// Sort position within the guild
    #[serde(default)]
    pub position: Option<i64>,
    /// Channel topic
    #[serde(default)]
    pub topic: Option<String>,
    /// Whether the channel is marked NSFW
    #[serde(default)]
    pub nsfw: bool,
}

/// Envelope returned by the thread listing endpoints
#[derive(Debug, Deserialize)]
struct ThreadList {
    #[serde(default)]
    threads: Vec<GuildChannel>,
}

/// Authenticated client for the upstream REST API
#[derive(Clone, Debug)]
pub struct DiscordClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl DiscordClient {
    /// Build a client from API settings
    ///
    /// The bearer token and User-Agent are attached as default headers on
    /// every request; the per-request timeout comes from
    /// [`ApiConfig::request_timeout`].
    pub fn new(api: &ApiConfig, retry: RetryConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&api.token).map_err(|_| Error::Config {
            message: "token contains characters invalid in an HTTP header".to_string(),
            key: Some("api.token".to_string()),
        })?;
        headers.insert(AUTHORIZATION, auth);
        let agent = HeaderValue::from_str(&api.user_agent).map_err(|_| Error::Config {
            message: "user agent contains characters invalid in an HTTP header".to_string(),
            key: Some("api.user_agent".to_string()),
        })?;
        headers.insert(USER_AGENT, agent);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(api.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// List up to [`MESSAGE_PAGE_LIMIT`] messages in a channel, newest first
    ///
    /// `before` is the exclusive-upper-bound cursor: only messages older
    /// than it are returned. Any non-200 status is a hard error for the
    /// channel.
    pub async fn list_messages(
        &self,
        channel_id: &ChannelId,
        before: Option<&MessageId>,
    ) -> Result<Vec<Message>> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel_id);
        let url = url.as_str();

        request_with_retry(&self.retry, move || async move {
            let mut request = self
                .http
                .get(url)
                .query(&[("limit", MESSAGE_PAGE_LIMIT.to_string())]);
            if let Some(cursor) = before {
                request = request.query(&[("before", cursor.as_str())]);
            }

            let response = request.send().await?;
            if response.status() != reqwest::StatusCode::OK {
                return Err(Error::Api {
                    status: response.status().as_u16(),
                    context: "failed to fetch messages".to_string(),
                });
            }
            Ok(response.json().await?)
        })
        .await
    }

    /// List all channels in a guild
    pub async fn list_guild_channels(&self, guild_id: &GuildId) -> Result<Vec<GuildChannel>> {
        let url = format!("{}/guilds/{}/channels", self.base_url, guild_id);
        let url = url.as_str();

        request_with_retry(&self.retry, move || async move {
            let response = self.http.get(url).send().await?;
            if response.status() != reqwest::StatusCode::OK {
                return Err(Error::Api {
                    status: response.status().as_u16(),
                    context: "failed to fetch channels".to_string(),
                });
            }
            Ok(response.json().await?)
        })
        .await
    }

    /// List a guild's forum channels (type code 15)
    pub async fn list_forum_channels(&self, guild_id: &GuildId) -> Result<Vec<GuildChannel>> {
        let channels = self.list_guild_channels(guild_id).await?;
        Ok(channels
            .into_iter()
            .filter(|ch| ch.kind == FORUM_CHANNEL_TYPE)
            .collect())
    }

    /// List currently-active threads in a forum channel
    ///
    /// A non-success status yields an empty list (logged); only
    /// network-level failures propagate. A thread cannot be both active and
    /// archived, so callers concatenate the two listings without dedup.
    pub async fn list_active_threads(&self, channel_id: &ChannelId) -> Result<Vec<GuildChannel>> {
        let url = format!("{}/channels/{}/threads/active", self.base_url, channel_id);
        self.list_threads(channel_id, &url).await
    }

    /// List publicly archived threads in a forum channel
    pub async fn list_archived_threads(&self, channel_id: &ChannelId) -> Result<Vec<GuildChannel>> {
        let url = format!(
            "{}/channels/{}/threads/archived/public",
            self.base_url, channel_id
        );
        self.list_threads(channel_id, &url).await
    }

    async fn list_threads(&self, channel_id: &ChannelId, url: &str) -> Result<Vec<GuildChannel>> {
        let response = request_with_retry(&self.retry, move || async move {
            let response = self.http.get(url).send().await?;
            let status = response.status().as_u16();
            if status == 429 || (500..=599).contains(&status) {
                return Err(Error::Api {
                    status,
                    context: "failed to fetch threads".to_string(),
                });
            }
            Ok(response)
        })
        .await?;

        if response.status() != reqwest::StatusCode::OK {
            tracing::warn!(
                channel_id = %channel_id,
                status = response.status().as_u16(),
                "Thread listing returned non-success status, skipping"
            );
            return Ok(Vec::new());
        }

        let list: ThreadList = response.json().await?;
        Ok(list.threads)
    }

    /// Fetch the raw bytes of an attachment
    ///
    /// The full body is buffered in memory so the caller can write the file
    /// in a single operation. A non-200 status is an error here; the walker
    /// treats it as a soft, skip-and-continue failure.
    pub async fn fetch_attachment(&self, url: &str) -> Result<Vec<u8>> {
        request_with_retry(&self.retry, move || async move {
            let response = self.http.get(url).send().await?;
            if response.status() != reqwest::StatusCode::OK {
                return Err(Error::Api {
                    status: response.status().as_u16(),
                    context: "failed to fetch attachment".to_string(),
                });
            }
            Ok(response.bytes().await?.to_vec())
        })
        .await
    }

    /// Check whether the configured token is accepted by the API
    ///
    /// Any failure (network, non-200) reports `false`; this is an advisory
    /// check for owners, never fatal.
    pub async fn validate_token(&self) -> bool {
        let url = format!("{}/users/@me", self.base_url);
        match self.http.get(&url).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::debug!(error = %e, "Token validation request failed");
                false
            }
        }
    }

    /// Check whether the token's account is a member of the given guild
    pub async fn is_member(&self, guild_id: &GuildId) -> bool {
        #[derive(Deserialize)]
        struct GuildRef {
            id: GuildId,
        }

        let url = format!("{}/users/@me/guilds", self.base_url);
        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "Guild membership request failed");
                return false;
            }
        };
        if response.status() != reqwest::StatusCode::OK {
            return false;
        }
        match response.json::<Vec<GuildRef>>().await {
            Ok(guilds) => guilds.iter().any(|g| &g.id == guild_id),
            Err(_) => false,
        }
    }
}
