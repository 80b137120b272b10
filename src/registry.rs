//! Platform registry and dispatcher.
//!
//! Maps a request URL to one extractor variant, runs it under the overall
//! extraction budget, and normalizes every outcome into an
//! [`ExtractionResult`]. Nothing raised by a variant escapes `extract`:
//! errors are classified and panics become `exception`.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, warn};
use url::Url;

use crate::cache::{key_for, ExtractionCache};
use crate::error::{ErrorKind, ExtractError};
use crate::extractors::{ExtractContext, Extractor};
use crate::http_client::{Deadline, Fetcher};
use crate::models::{ExtractionRequest, ExtractionResult, MediaLink, PlatformDescriptor};
use crate::token::TokenChain;

type FlightMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Held while one extraction for a cache key is in progress.
struct Flight<'a> {
    map: &'a FlightMap,
    key: String,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        self.guard.take();
        if let Ok(mut map) = self.map.lock() {
            // Only the map and this flight still reference the slot
            if Arc::strong_count(&self.slot) == 2 {
                map.remove(&self.key);
            }
        }
    }
}

pub struct Registry {
    platforms: Vec<(PlatformDescriptor, Extractor)>,
    fetcher: Fetcher,
    tokens: TokenChain,
    cache: Arc<ExtractionCache>,
    extract_timeout: Duration,
    in_flight: FlightMap,
}

impl Registry {
    /// Build from descriptors in dispatch order. Descriptors naming an
    /// unknown extractor are skipped.
    pub fn new(
        descriptors: Vec<PlatformDescriptor>,
        fetcher: Fetcher,
        tokens: TokenChain,
        cache: Arc<ExtractionCache>,
        extract_timeout: Duration,
    ) -> Self {
        let platforms = descriptors
            .into_iter()
            .filter_map(|d| match Extractor::from_id(&d.extractor) {
                Some(extractor) => Some((d, extractor)),
                None => {
                    warn!("Platform '{}' names unknown extractor '{}', skipping", d.id, d.extractor);
                    None
                }
            })
            .collect();

        Self {
            platforms,
            fetcher,
            tokens,
            cache,
            extract_timeout,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<ExtractionCache> {
        &self.cache
    }

    pub fn tokens(&self) -> &TokenChain {
        &self.tokens
    }

    /// Every configured platform, enabled or not.
    pub fn platforms(&self) -> impl Iterator<Item = &PlatformDescriptor> {
        self.platforms.iter().map(|(d, _)| d)
    }

    /// Enabled platforms in dispatch order.
    pub fn supported_platforms(&self) -> Vec<&PlatformDescriptor> {
        self.platforms().filter(|d| d.enabled).collect()
    }

    /// The platform a URL would be dispatched to.
    pub fn descriptor_for(&self, url: &str) -> Option<&PlatformDescriptor> {
        let parsed = parse_request_url(url).ok()?;
        self.dispatch(&parsed).ok().map(|(d, _)| d)
    }

    /// Drop any cached result for `url`. The URL is normalized the same way
    /// `extract` normalizes it; an unparsable URL has nothing cached.
    pub fn invalidate(&self, url: &str) -> bool {
        match parse_request_url(url) {
            Ok(url) => self.cache.invalidate(&key_for(url.as_str())),
            Err(_) => false,
        }
    }

    pub async fn extract_url(&self, url: &str, options: crate::models::ExtractOptions) -> ExtractionResult {
        self.extract(&ExtractionRequest::new(url, options)).await
    }

    /// Extract a direct link for `request`. Never fails: errors are
    /// returned as failure results carrying a remediation hint.
    pub async fn extract(&self, request: &ExtractionRequest) -> ExtractionResult {
        match self.try_extract(request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    "Extraction failed for {} [{}{}]: {}",
                    request.url,
                    e.kind,
                    e.platform.as_deref().map(|p| format!(", {}", p)).unwrap_or_default(),
                    e.message
                );
                ExtractionResult::failure(e).with_remediation()
            }
        }
    }

    async fn try_extract(&self, request: &ExtractionRequest) -> Result<ExtractionResult, ExtractError> {
        let url = parse_request_url(&request.url)?;
        let key = key_for(url.as_str());
        let reads_cache = request.options.reads_cache();

        if reads_cache {
            if let Some(hit) = self.cache.get(&key) {
                debug!("Cache hit for {}", request.url);
                return Ok(hit);
            }
        }

        let (descriptor, extractor) = self.dispatch(&url)?;
        debug!("Dispatching {} to {}", url, descriptor.id);

        let _flight = self.begin_flight(&key).await;
        if reads_cache {
            // A concurrent caller may have filled the cache while we waited
            if let Some(hit) = self.cache.get(&key) {
                debug!("Cache filled while waiting for {}", request.url);
                return Ok(hit);
            }
        }

        let link = self
            .run_extractor(descriptor, extractor, &url)
            .await
            .map_err(|e| e.with_platform(descriptor.name.clone()))?;
        let result = ExtractionResult::success(descriptor.name.clone(), link);

        if !request.options.skip_cache {
            if let Some(ttl) = self.cache_ttl(descriptor, result.link()) {
                self.cache.set(&key, &result, ttl);
            }
        }
        Ok(result)
    }

    /// Concrete domain matches first, in configuration order, then the
    /// self-validating wildcards.
    fn dispatch(&self, url: &Url) -> Result<(&PlatformDescriptor, Extractor), ExtractError> {
        let host = url.host_str().unwrap_or_default();
        let enabled = || self.platforms.iter().filter(|(d, _)| d.enabled);

        if let Some((descriptor, extractor)) = enabled().find(|(d, _)| !d.is_wildcard() && d.matches_host(host)) {
            if !extractor.validate_url(url) {
                return Err(ExtractError::invalid_link(format!(
                    "not a recognised {} link",
                    descriptor.name
                ))
                .with_platform(descriptor.name.clone()));
            }
            return Ok((descriptor, *extractor));
        }

        if let Some((descriptor, extractor)) = enabled()
            .filter(|(d, _)| d.is_wildcard())
            .find(|(_, e)| e.validate_url(url))
        {
            return Ok((descriptor, *extractor));
        }

        let names: Vec<&str> = enabled().map(|(d, _)| d.name.as_str()).collect();
        Err(ExtractError::new(
            ErrorKind::UnsupportedPlatform,
            format!("no platform handles {} (supported: {})", host, names.join(", ")),
        ))
    }

    async fn begin_flight(&self, key: &str) -> Flight<'_> {
        let slot = match self.in_flight.lock() {
            Ok(mut map) => map.entry(key.to_string()).or_default().clone(),
            Err(_) => Arc::new(AsyncMutex::new(())),
        };
        let guard = slot.clone().lock_owned().await;
        Flight {
            map: &self.in_flight,
            key: key.to_string(),
            slot,
            guard: Some(guard),
        }
    }

    async fn run_extractor(
        &self,
        descriptor: &PlatformDescriptor,
        extractor: Extractor,
        url: &Url,
    ) -> Result<MediaLink, ExtractError> {
        let deadline = Deadline::after(self.extract_timeout);
        let ctx = ExtractContext {
            fetcher: &self.fetcher,
            tokens: &self.tokens,
            descriptor,
            deadline,
        };

        match tokio::time::timeout_at(deadline.instant(), catch_panics(extractor.extract(url, &ctx))).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(message)) => {
                error!("{} extractor panicked on {}: {}", descriptor.name, url, message);
                Err(ExtractError::exception(format!("{} extractor crashed: {}", descriptor.name, message)))
            }
            Err(_) => Err(ExtractError::new(
                ErrorKind::ConnectionFailed,
                format!(
                    "extraction did not finish within {}s",
                    self.extract_timeout.as_secs()
                ),
            )),
        }
    }

    /// Platform lifetime or the link's own expiry, whichever is tighter;
    /// the cache default when neither is known. `None` skips caching.
    fn cache_ttl(&self, descriptor: &PlatformDescriptor, link: Option<&MediaLink>) -> Option<Duration> {
        let lifetime = Some(descriptor.default_link_lifetime)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let detected = match link.and_then(|l| l.expiry) {
            Some(expiry) if expiry.expires_in <= 0 => return None,
            Some(expiry) => Some(Duration::from_secs(expiry.expires_in as u64)),
            None => None,
        };

        Some(match (lifetime, detected) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => self.cache.config().default_ttl,
        })
    }
}

fn parse_request_url(raw: &str) -> Result<Url, ExtractError> {
    let url = Url::parse(raw.trim()).map_err(|e| ExtractError::invalid_url(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(url),
        _ => Err(ExtractError::invalid_url(format!("{} is not an http(s) URL", raw))),
    }
}

/// Run `fut`, turning a panic into its message.
async fn catch_panics<F, T>(fut: F) -> Result<T, String>
where
    F: Future<Output = T>,
{
    AssertUnwindSafe(fut).catch_unwind().await.map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
