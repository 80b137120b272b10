//! HTTP surface for extraction.
//!
//! Exposes the extraction envelope over `GET /api/extract`, the platform
//! table over `GET /api/platforms` and a liveness probe at `GET /health`.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::registry::Registry;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

/// Start the web server.
pub async fn serve(registry: Arc<Registry>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(AppState::new(registry));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::cache::{CacheConfig, ExtractionCache};
    use crate::config::default_platforms;
    use crate::http_client::testing::ScriptedTransport;
    use crate::http_client::{Fetcher, RetryPolicy};
    use crate::repository::InMemorySettingsStore;
    use crate::token::{TokenChain, TokenConfig};

    fn setup_test_app() -> (axum::Router, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new());
        let fetcher = Fetcher::new(
            transport.clone(),
            RetryPolicy {
                max_retries: 1,
                max_jitter: Duration::ZERO,
                ..Default::default()
            },
        );
        let tokens = TokenChain::new(
            Arc::new(InMemorySettingsStore::new()),
            fetcher.clone(),
            TokenConfig::new(),
        );
        let cache = Arc::new(ExtractionCache::new(CacheConfig::default()));
        let registry = Registry::new(
            default_platforms(),
            fetcher,
            tokens,
            cache,
            Duration::from_secs(30),
        );
        (create_router(AppState::new(Arc::new(registry))), transport)
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = setup_test_app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_platforms() {
        let (app, _) = setup_test_app();
        let (status, json) = get_json(app, "/api/platforms").await;

        assert_eq!(status, StatusCode::OK);
        let platforms = json.as_array().unwrap();
        assert_eq!(platforms.len(), 12);
        assert_eq!(platforms[0]["id"], "terabox");
        let direct = platforms.last().unwrap();
        assert_eq!(direct["id"], "direct");
        assert_eq!(direct["domains"], serde_json::json!(["*"]));
    }

    #[tokio::test]
    async fn test_api_extract_success() {
        let (app, transport) = setup_test_app();
        transport.respond(
            "https://pixeldrain.com/api/file/abc123/info",
            200,
            r#"{"success":true,"name":"clip.mp4","size":2048}"#,
        );

        let (status, json) = get_json(
            app,
            "/api/extract?url=https%3A%2F%2Fpixeldrain.com%2Fu%2Fabc123",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["platform"], "Pixeldrain");
        assert_eq!(json["data"]["filename"], "clip.mp4");
        assert_eq!(json["cached"], false);
    }

    #[tokio::test]
    async fn test_api_extract_failure_is_enveloped() {
        let (app, _) = setup_test_app();
        let (status, json) = get_json(
            app,
            "/api/extract?url=https%3A%2F%2Funknown.example%2Fwatch",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "unsupported_platform");
        assert!(json["hint"].is_string());
    }

    #[tokio::test]
    async fn test_api_extract_missing_url() {
        let (app, transport) = setup_test_app();
        let (status, json) = get_json(app, "/api/extract").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "invalid_url");
        assert!(transport.requests().is_empty());
    }
}
