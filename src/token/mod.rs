//! Platform credential acquisition.
//!
//! Some platforms only answer their private APIs when a request carries a
//! page-embedded token. [`TokenChain`] resolves one by trying, in order, the
//! token persisted in the settings store, a configured token endpoint, a
//! sample page of the platform, and finally a configured hardcoded value.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::http_client::{Deadline, FetchError, FetchRequest, Fetcher};
use crate::repository::{SettingsStore, StoreError};

/// Minimum length of a plausible token.
pub const MIN_TOKEN_LEN: usize = 64;

/// Where a token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TokenSource {
    Stored,
    Endpoint,
    SamplePage,
    Fallback,
}

impl TokenSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Endpoint => "endpoint",
            Self::SamplePage => "sample_page",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    pub value: String,
    pub source: TokenSource,
    /// Stored token older than the freshness window.
    pub stale: bool,
}

/// Token chain settings.
#[derive(Debug, Clone, Default)]
pub struct TokenConfig {
    /// External endpoint returning a token as JSON or plain text.
    pub endpoint: Option<String>,
    /// Platform page embedding a token.
    pub sample_page: Option<String>,
    /// Last-resort hardcoded token.
    pub fallback: Option<String>,
    pub freshness: Duration,
    /// Bound for each network source.
    pub source_timeout: Duration,
}

impl TokenConfig {
    pub fn new() -> Self {
        Self {
            freshness: Duration::from_secs(6 * 3600),
            source_timeout: Duration::from_secs(15),
            ..Default::default()
        }
    }
}

#[derive(Debug, Error)]
enum TokenError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("timed out")]
    Timeout,
    #[error("no valid token in response")]
    NotFound,
}

/// Token shape check: hexadecimal and at least [`MIN_TOKEN_LEN`] long.
pub fn is_valid_token(token: &str) -> bool {
    token.len() >= MIN_TOKEN_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Settings keys holding a platform's token and its update time.
pub fn setting_keys(platform: &str) -> (String, String) {
    (
        format!("{}_js_token", platform),
        format!("{}_js_token_updated_at", platform),
    )
}

/// Patterns that embed a token in platform pages.
static PAGE_TOKEN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // URL-encoded `fn("...")` call
        Regex::new(r#"fn%28%22([0-9A-Fa-f]{64,})%22%29"#).unwrap(),
        Regex::new(r#"fn\("([0-9A-Fa-f]{64,})"\)"#).unwrap(),
        Regex::new(r#""jsToken"\s*:\s*"([0-9A-Fa-f]{64,})""#).unwrap(),
        Regex::new(r#"jsToken\s*=\s*["']([0-9A-Fa-f]{64,})["']"#).unwrap(),
    ]
});

/// Find an embedded token in a platform page.
pub fn token_from_page(html: &str) -> Option<String> {
    PAGE_TOKEN_PATTERNS
        .iter()
        .find_map(|re| re.captures(html).map(|c| c[1].to_string()))
        .filter(|t| is_valid_token(t))
}

/// Read a token from an endpoint body: `{"token"}`, `{"data":{"token"}}`,
/// `{"jsToken"}` or the bare token as text.
pub fn token_from_endpoint_body(body: &str) -> Option<String> {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        let candidates = [
            json.get("token"),
            json.get("jsToken"),
            json.get("js_token"),
            json.get("data").and_then(|d| d.get("token")),
        ];
        return candidates
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .find(|s| is_valid_token(s));
    }

    let trimmed = body.trim().trim_matches('"');
    is_valid_token(trimmed).then(|| trimmed.to_string())
}

/// Resolves platform tokens from an ordered list of sources.
#[derive(Clone)]
pub struct TokenChain {
    store: Arc<dyn SettingsStore>,
    fetcher: Fetcher,
    config: TokenConfig,
}

impl TokenChain {
    pub fn new(store: Arc<dyn SettingsStore>, fetcher: Fetcher, config: TokenConfig) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    /// First valid token from the chain, or `None` when every source failed.
    pub async fn resolve_token(&self, platform: &str, deadline: &Deadline) -> Option<ResolvedToken> {
        match self.stored_token(platform).await {
            Ok(Some(token)) => return Some(token),
            Ok(None) => debug!("No stored {} token", platform),
            Err(e) => debug!("Stored {} token unavailable: {}", platform, e),
        }
        self.network_chain(platform, deadline).await
    }

    /// Skip the stored token and go to the network sources.
    pub async fn refresh_token(&self, platform: &str, deadline: &Deadline) -> Option<ResolvedToken> {
        self.network_chain(platform, deadline).await
    }

    /// The stored token and its last update time, without validation.
    pub async fn stored(&self, platform: &str) -> Result<Option<(String, Option<DateTime<Utc>>)>, StoreError> {
        let (token_key, updated_key) = setting_keys(platform);
        let Some(token) = self.store.get(&token_key).await? else {
            return Ok(None);
        };
        let updated = self
            .store
            .get(&updated_key)
            .await?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Ok(Some((token, updated)))
    }

    async fn stored_token(&self, platform: &str) -> Result<Option<ResolvedToken>, TokenError> {
        let Some((token, updated)) = self.stored(platform).await? else {
            return Ok(None);
        };
        if !is_valid_token(&token) {
            debug!("Stored {} token has an invalid shape, ignoring", platform);
            return Ok(None);
        }

        let freshness = chrono::Duration::from_std(self.config.freshness)
            .unwrap_or_else(|_| chrono::Duration::hours(6));
        let stale = match updated {
            Some(at) => Utc::now() - at > freshness,
            None => true,
        };
        if stale {
            debug!("Stored {} token is stale, using it until a refresh lands", platform);
        }

        Ok(Some(ResolvedToken {
            value: token,
            source: TokenSource::Stored,
            stale,
        }))
    }

    async fn network_chain(&self, platform: &str, deadline: &Deadline) -> Option<ResolvedToken> {
        if let Some(endpoint) = &self.config.endpoint {
            match self.bounded(self.from_endpoint(endpoint, deadline), deadline).await {
                Ok(token) => return self.accept(platform, token, TokenSource::Endpoint).await,
                Err(e) => debug!("Token endpoint failed for {}: {}", platform, e),
            }
        }

        if let Some(page) = &self.config.sample_page {
            match self.bounded(self.from_sample_page(page, deadline), deadline).await {
                Ok(token) => return self.accept(platform, token, TokenSource::SamplePage).await,
                Err(e) => debug!("Token scrape failed for {}: {}", platform, e),
            }
        }

        if let Some(fallback) = self.config.fallback.as_deref().filter(|t| is_valid_token(t)) {
            warn!(
                "Using hardcoded fallback {} token; low confidence, network sources unavailable",
                platform
            );
            return Some(ResolvedToken {
                value: fallback.to_string(),
                source: TokenSource::Fallback,
                stale: false,
            });
        }

        warn!("No {} token could be resolved from any source", platform);
        None
    }

    async fn bounded<F>(&self, source: F, deadline: &Deadline) -> Result<String, TokenError>
    where
        F: std::future::Future<Output = Result<String, TokenError>>,
    {
        let limit = self.config.source_timeout.min(deadline.remaining());
        tokio::time::timeout(limit, source)
            .await
            .unwrap_or(Err(TokenError::Timeout))
    }

    async fn from_endpoint(&self, endpoint: &str, deadline: &Deadline) -> Result<String, TokenError> {
        let deadline = deadline.narrowed(self.config.source_timeout);
        let response = self
            .fetcher
            .fetch(&FetchRequest::get(endpoint), &deadline)
            .await?;
        token_from_endpoint_body(&response.body).ok_or(TokenError::NotFound)
    }

    async fn from_sample_page(&self, page: &str, deadline: &Deadline) -> Result<String, TokenError> {
        let deadline = deadline.narrowed(self.config.source_timeout);
        let body = self.fetcher.get_text(page, &deadline).await?;
        token_from_page(&body).ok_or(TokenError::NotFound)
    }

    async fn accept(&self, platform: &str, token: String, source: TokenSource) -> Option<ResolvedToken> {
        info!("Resolved {} token from {}", platform, source.as_str());
        let (token_key, updated_key) = setting_keys(platform);
        let persisted = async {
            self.store.set(&token_key, &token).await?;
            self.store.set(&updated_key, &Utc::now().to_rfc3339()).await
        };
        if let Err(e) = persisted.await {
            warn!("Failed to persist {} token: {}", platform, e);
        }
        Some(ResolvedToken {
            value: token,
            source,
            stale: false,
        })
    }
}
