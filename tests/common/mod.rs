//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use vidlink::cache::{CacheConfig, ExtractionCache};
use vidlink::http_client::{
    FetchResponse, Fetcher, HttpTransport, RetryPolicy, TransportError, TransportRequest,
};
use vidlink::models::{DomainMatch, PlatformDescriptor};
use vidlink::registry::Registry;
use vidlink::repository::InMemorySettingsStore;
use vidlink::token::{TokenChain, TokenConfig};

/// Answers requests whose URL contains a registered fragment; everything
/// else is a connection failure. Counts every request.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<(String, u16, String)>>,
    pub urls: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, fragment: &str, status: u16, body: impl Into<String>) {
        self.routes
            .lock()
            .unwrap()
            .push((fragment.to_string(), status, body.into()));
    }

    pub fn request_count(&self) -> usize {
        self.urls.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn execute(&self, request: &TransportRequest) -> Result<FetchResponse, TransportError> {
        let url = request.request.url.clone();
        self.urls.lock().unwrap().push(url.clone());

        let routes = self.routes.lock().unwrap();
        match routes.iter().find(|(fragment, _, _)| url.contains(fragment.as_str())) {
            Some((_, status, body)) => Ok(FetchResponse::new(*status, body.clone(), url)),
            None => Err(TransportError::connection("connection reset by peer")),
        }
    }
}

pub const TOKEN_HEX: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

/// A TeraBox-style host plus the wildcard direct-file platform.
pub fn descriptors() -> Vec<PlatformDescriptor> {
    vec![
        PlatformDescriptor {
            id: "knownhost".to_string(),
            name: "Known Host".to_string(),
            domains: DomainMatch::Domains(vec!["knownhost.example".to_string()]),
            enabled: true,
            extractor: "terabox".to_string(),
            default_link_lifetime: 4 * 3600,
            icon: None,
            requires_credential: true,
        },
        PlatformDescriptor {
            id: "direct".to_string(),
            name: "Direct".to_string(),
            domains: DomainMatch::AnyDomain,
            enabled: true,
            extractor: "direct".to_string(),
            default_link_lifetime: 0,
            icon: None,
            requires_credential: false,
        },
    ]
}

pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 1,
        max_jitter: Duration::ZERO,
        ..Default::default()
    }
}

pub fn registry(transport: Arc<FakeTransport>, policy: RetryPolicy) -> Registry {
    let fetcher = Fetcher::new(transport, policy);
    let mut token = TokenConfig::new();
    token.fallback = Some(TOKEN_HEX.to_string());
    let tokens = TokenChain::new(Arc::new(InMemorySettingsStore::new()), fetcher.clone(), token);
    let cache = Arc::new(ExtractionCache::new(CacheConfig::default()));
    Registry::new(descriptors(), fetcher, tokens, cache, Duration::from_secs(60))
}

/// A `share/list` body with one file expiring `expires_in` seconds from now.
pub fn share_list(filename: &str, expires_in: i64, size: u64) -> String {
    let expire = chrono::Utc::now().timestamp() + expires_in;
    serde_json::json!({
        "errno": 0,
        "list": [{
            "server_filename": filename,
            "dlink": format!("https://cdn.example/x?expire={}", expire),
            "size": size,
            "isdir": 0
        }]
    })
    .to_string()
}
