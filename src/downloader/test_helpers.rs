//! Shared fixtures for downloader tests.

use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use crate::config::{ApiConfig, Config, DownloadConfig, PersistenceConfig, RetryConfig};
use crate::types::{ChannelId, Event};

use super::DiscordDownloader;

/// Matches listing requests that carry no `before` query parameter, i.e.
/// the first page of a walk. Needed because `query_param` can only assert
/// presence, not absence.
pub(crate) struct NoBeforeParam;

impl wiremock::Match for NoBeforeParam {
    fn matches(&self, request: &Request) -> bool {
        !request.url.query_pairs().any(|(key, _)| key == "before")
    }
}

/// Config pointed at a mock server with retries disabled and all paths
/// inside the given temp directory
pub(crate) fn test_config(server: &MockServer, dir: &Path) -> Config {
    Config {
        api: ApiConfig {
            base_url: server.uri(),
            token: "test-token".to_string(),
            user_agent: "test-agent".to_string(),
            request_timeout: Duration::from_secs(5),
        },
        download: DownloadConfig {
            download_dir: dir.join("DOWNLOADS"),
            max_concurrent_sessions: 3,
        },
        persistence: PersistenceConfig {
            state_file: dir.join("download_state.json"),
        },
        retry: RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            backoff_multiplier: 2.0,
            jitter: false,
        },
    }
}

/// Engine wired to a mock server and a temp directory
pub(crate) async fn test_engine(server: &MockServer, dir: &TempDir) -> DiscordDownloader {
    DiscordDownloader::new(test_config(server, dir.path()))
        .await
        .unwrap()
}

/// Wire-shaped message JSON with attachments pointing at the mock server
///
/// Each `(filename, url)` pair becomes one attachment.
pub(crate) fn message_json(id: &str, attachments: &[(&str, &str)]) -> serde_json::Value {
    let attachments: Vec<serde_json::Value> = attachments
        .iter()
        .map(|(filename, url)| {
            serde_json::json!({
                "filename": filename,
                "url": url,
                "size": 3,
            })
        })
        .collect();

    serde_json::json!({
        "id": id,
        "content": format!("message {id}"),
        "author": { "id": "77", "username": "poster" },
        "timestamp": "2024-05-01T12:00:00.000000+00:00",
        "embeds": [],
        "attachments": attachments,
    })
}

/// Mount an attachment body at the given path
pub(crate) async fn mount_attachment(server: &MockServer, url_path: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(url_path.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Mount the terminating empty page for a channel's message listing
///
/// Mount this after the non-empty pages: wiremock dispatches to the first
/// matching mock, so specific `before` matchers must come first.
pub(crate) async fn mount_empty_page(server: &MockServer, channel_id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/channels/{channel_id}/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(server)
        .await;
}

/// Drain events until the terminal event for the given channel arrives
///
/// Returns every event seen for that channel, terminal included. Panics
/// after five seconds without a terminal event.
pub(crate) async fn collect_until_terminal(
    rx: &mut tokio::sync::broadcast::Receiver<Event>,
    channel_id: &ChannelId,
) -> Vec<Event> {
    let mut events = Vec::new();
    let deadline = Duration::from_secs(5);

    loop {
        let event = tokio::time::timeout(deadline, rx.recv())
            .await
            .expect("timed out waiting for terminal event")
            .expect("event channel closed");

        let (id, terminal) = match &event {
            Event::Queued { channel_id, .. } => (channel_id.clone(), false),
            Event::Started { channel_id } => (channel_id.clone(), false),
            Event::Progress { channel_id, .. } => (channel_id.clone(), false),
            Event::Completed { channel_id, .. } => (channel_id.clone(), true),
            Event::Failed { channel_id, .. } => (channel_id.clone(), true),
            Event::Cancelled { channel_id } => (channel_id.clone(), true),
        };

        if &id == channel_id {
            events.push(event);
            if terminal {
                return events;
            }
        }
    }
}
