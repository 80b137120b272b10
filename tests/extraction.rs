//! End-to-end extraction through the registry.

mod common;

use std::time::Duration;

use common::{fast_policy, registry, share_list, FakeTransport};
use vidlink::error::ErrorKind;
use vidlink::http_client::RetryPolicy;
use vidlink::models::ExtractOptions;

const SHARE_URL: &str = "https://knownhost.example/s/ABC123";

#[tokio::test]
async fn test_successful_extraction() {
    let transport = FakeTransport::new();
    transport.route("/share/list", 200, share_list("movie.mp4", 3600, 104_857_600));
    let registry = registry(transport.clone(), fast_policy());

    let result = registry.extract_url(SHARE_URL, ExtractOptions::default()).await;
    let envelope = result.to_envelope();

    assert!(envelope.success, "{:?}", envelope);
    assert_eq!(envelope.platform.as_deref(), Some("Known Host"));
    let data = envelope.data.unwrap();
    assert_eq!(data.filename, "movie.mp4");
    assert_eq!(data.size_formatted.as_deref(), Some("100 MB"));
    assert!(data.has_expiry);
    let expires_in = data.expires_in.unwrap();
    assert!((3595..=3600).contains(&expires_in), "expires_in = {}", expires_in);
    assert!(!envelope.cached);

    let urls = transport.urls.lock().unwrap().clone();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].contains("shorturl=ABC123"));
    assert!(urls[0].contains(&format!("jsToken={}", common::TOKEN_HEX)));
}

#[tokio::test]
async fn test_unsupported_platform() {
    let transport = FakeTransport::new();
    let registry = registry(transport.clone(), fast_policy());

    let result = registry
        .extract_url(
            "https://totally-unknown-host.example/video/1",
            ExtractOptions::default(),
        )
        .await;
    let envelope = result.to_envelope();

    assert!(!envelope.success);
    assert_eq!(envelope.error, Some(ErrorKind::UnsupportedPlatform));
    assert!(envelope.hint.is_some());
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_cache_hit_avoids_network() {
    let transport = FakeTransport::new();
    transport.route("/share/list", 200, share_list("movie.mp4", 3600, 1024));
    let registry = registry(transport.clone(), fast_policy());

    let first = registry.extract_url(SHARE_URL, ExtractOptions::default()).await;
    assert!(first.is_success());
    assert_eq!(transport.request_count(), 1);

    let second = registry.extract_url(SHARE_URL, ExtractOptions::default()).await;
    assert!(second.is_success());
    assert!(second.cached);
    assert!(second.to_envelope().cached);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_forced_refresh_bypasses_cache() {
    let transport = FakeTransport::new();
    transport.route("/share/list", 200, share_list("movie.mp4", 3600, 1024));
    let registry = registry(transport.clone(), fast_policy());

    registry.extract_url(SHARE_URL, ExtractOptions::default()).await;
    assert_eq!(transport.request_count(), 1);

    let refreshed = registry.extract_url(SHARE_URL, ExtractOptions::refresh()).await;
    assert!(refreshed.is_success());
    assert!(!refreshed.cached);
    assert_eq!(transport.request_count(), 2);

    // The refreshed result was written back
    let cached = registry.extract_url(SHARE_URL, ExtractOptions::default()).await;
    assert!(cached.cached);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_surface_connection_failed() {
    let transport = FakeTransport::new();
    let policy = RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_secs(1),
        max_jitter: Duration::ZERO,
        request_timeout: Duration::from_secs(20),
    };
    let registry = registry(transport.clone(), policy);

    let started = tokio::time::Instant::now();
    let result = registry
        .extract_url("https://files.example/v/movie.mp4", ExtractOptions::default())
        .await;
    let elapsed = started.elapsed();

    assert_eq!(result.error_kind(), Some(ErrorKind::ConnectionFailed));
    assert_eq!(result.platform.as_deref(), Some("Direct"));
    assert!(result.error().unwrap().message.contains("connection reset"));
    assert_eq!(transport.request_count(), 3);
    // Backoff of 1s then 2s between the three attempts
    assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(4), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_platform_errors_are_classified() {
    let transport = FakeTransport::new();
    transport.route(
        "/share/list",
        200,
        r#"{"errno":-9,"errmsg":"file does not exist"}"#,
    );
    let registry = registry(transport, fast_policy());

    let result = registry.extract_url(SHARE_URL, ExtractOptions::default()).await;
    let failure = result.error().unwrap();
    assert_eq!(failure.kind, ErrorKind::FileNotFound);
    assert!(failure.hint.is_some());
    assert_ne!(failure.hint.as_deref(), Some(failure.kind.as_str()));
}
