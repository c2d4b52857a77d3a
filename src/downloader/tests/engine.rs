//! Engine control surface: submission rules, status snapshots, shutdown.

use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::downloader::test_helpers::{
    NoBeforeParam, collect_until_terminal, message_json, mount_attachment, mount_empty_page,
    test_config, test_engine,
};
use crate::error::Error;
use crate::types::{ChannelId, ChannelKind, DownloadTask, Event, Status};

/// Mount a first page whose response is slow enough to observe the session
/// in its downloading state.
async fn mount_slow_page(server: &MockServer, channel_id: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(format!("/channels/{channel_id}/messages")))
        .and(NoBeforeParam)
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([]))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn duplicate_submission_is_rejected_while_active() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_slow_page(&server, "111", Duration::from_millis(500)).await;

    let engine = test_engine(&server, &dir).await;
    let mut rx = engine.subscribe();
    let channel_id = ChannelId::from("111");

    engine
        .download(DownloadTask::new("111", "general", ChannelKind::Text, "9"))
        .await
        .unwrap();

    let err = engine
        .download(DownloadTask::new("111", "general", ChannelKind::Text, "9"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Duplicate(_)));

    // Once the first session resolves, the channel can be submitted again.
    let events = collect_until_terminal(&mut rx, &channel_id).await;
    assert!(matches!(events.last(), Some(Event::Completed { .. })));
    engine
        .download(DownloadTask::new("111", "general", ChannelKind::Text, "9"))
        .await
        .unwrap();
}

#[tokio::test]
async fn shutdown_rejects_new_submissions() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let engine = test_engine(&server, &dir).await;
    engine.shutdown().await;

    let err = engine
        .download(DownloadTask::new("111", "general", ChannelKind::Text, "9"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));
}

#[tokio::test]
async fn shutdown_cancels_active_sessions() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_slow_page(&server, "111", Duration::from_secs(2)).await;

    let engine = test_engine(&server, &dir).await;
    let mut rx = engine.subscribe();
    let channel_id = ChannelId::from("111");
    engine
        .download(DownloadTask::new("111", "general", ChannelKind::Text, "9"))
        .await
        .unwrap();

    engine.shutdown().await;

    let events = collect_until_terminal(&mut rx, &channel_id).await;
    assert!(matches!(events.last(), Some(Event::Cancelled { .. })));
    assert!(engine.status().await.active.is_empty());
}

#[tokio::test]
async fn cancel_of_unknown_channel_is_not_found() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let engine = test_engine(&server, &dir).await;
    let err = engine.cancel(&ChannelId::from("404")).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn status_separates_active_from_queued() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_slow_page(&server, "111", Duration::from_secs(2)).await;

    let engine = test_engine(&server, &dir).await;
    engine
        .download(DownloadTask::new("111", "general", ChannelKind::Text, "9"))
        .await
        .unwrap();

    let mut scheduled = DownloadTask::new("222", "later", ChannelKind::Text, "9");
    scheduled.scheduled_time = Some(chrono::Utc::now() + chrono::Duration::hours(1));
    engine.download(scheduled).await.unwrap();

    // Let the first session reach its listing request.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let status = engine.status().await;
    assert_eq!(status.active.len(), 1);
    assert_eq!(status.active[0].channel_id, ChannelId::from("111"));
    assert_eq!(status.active[0].status, Status::Downloading);
    assert_eq!(status.queued.len(), 1);
    assert_eq!(status.queued[0].channel_id, ChannelId::from("222"));

    engine.cancel_all().await;
}

#[tokio::test]
async fn concurrency_cap_holds_excess_sessions_in_pending() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_slow_page(&server, "111", Duration::from_secs(2)).await;
    mount_slow_page(&server, "222", Duration::from_secs(2)).await;

    let mut config = test_config(&server, dir.path());
    config.download.max_concurrent_sessions = 1;
    let engine = crate::downloader::DiscordDownloader::new(config).await.unwrap();

    engine
        .download(DownloadTask::new("111", "one", ChannelKind::Text, "9"))
        .await
        .unwrap();
    engine
        .download(DownloadTask::new("222", "two", ChannelKind::Text, "9"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    let status = engine.status().await;
    assert_eq!(status.active.len(), 1, "only one session may hold a permit");
    assert_eq!(status.queued.len(), 1);

    engine.cancel_all().await;
}

#[tokio::test]
async fn successful_session_emits_the_full_event_sequence() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/channels/111/messages"))
        .and(NoBeforeParam)
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            message_json("900", &[("a.png", &format!("{}/cdn/a.png", server.uri()))]),
        ])))
        .mount(&server)
        .await;
    mount_empty_page(&server, "111").await;
    mount_attachment(&server, "/cdn/a.png", b"AAA").await;

    let engine = test_engine(&server, &dir).await;
    let mut rx = engine.subscribe();
    let channel_id = ChannelId::from("111");
    engine
        .download(DownloadTask::new("111", "general", ChannelKind::Text, "9"))
        .await
        .unwrap();

    let events = collect_until_terminal(&mut rx, &channel_id).await;

    assert!(
        matches!(&events[0], Event::Queued { channel_name, .. } if channel_name == "general")
    );
    assert!(matches!(&events[1], Event::Started { .. }));
    assert!(matches!(
        &events[2],
        Event::Progress {
            downloaded: 1,
            total: 1,
            ..
        }
    ));
    assert!(
        matches!(&events[3], Event::Completed { channel_name, .. } if channel_name == "general")
    );
    assert_eq!(events.len(), 4);
}

#[tokio::test]
async fn progress_message_names_the_channel_and_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/channels/111/messages"))
        .and(NoBeforeParam)
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            message_json("900", &[("a.png", &format!("{}/cdn/a.png", server.uri()))]),
        ])))
        .mount(&server)
        .await;
    mount_empty_page(&server, "111").await;
    mount_attachment(&server, "/cdn/a.png", b"AAA").await;

    let engine = test_engine(&server, &dir).await;
    let mut rx = engine.subscribe();
    let channel_id = ChannelId::from("111");
    engine
        .download(DownloadTask::new("111", "general", ChannelKind::Text, "9"))
        .await
        .unwrap();

    let events = collect_until_terminal(&mut rx, &channel_id).await;
    let message = events
        .iter()
        .find_map(|e| match e {
            Event::Progress { message, .. } => Some(message.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(message, "general: a.png");
}
