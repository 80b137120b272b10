//! Platform extractors.
//!
//! Each hosting platform gets one extractor implementing
//! [`PlatformExtractor`]. The closed [`Extractor`] enum holds every variant so
//! the registry can build them from configuration ids and dispatch without
//! trait objects.

pub mod packer;
pub mod scrape;

mod direct;
mod doodstream;
mod filemoon;
mod gofile;
mod krakenfiles;
mod mixdrop;
mod mp4upload;
mod pixeldrain;
mod streamtape;
mod streamwish;
mod terabox;
mod vidoza;

pub use direct::DirectExtractor;
pub use doodstream::DoodstreamExtractor;
pub use filemoon::FilemoonExtractor;
pub use gofile::GofileExtractor;
pub use krakenfiles::KrakenfilesExtractor;
pub use mixdrop::MixdropExtractor;
pub use mp4upload::Mp4uploadExtractor;
pub use pixeldrain::PixeldrainExtractor;
pub use streamtape::StreamtapeExtractor;
pub use streamwish::StreamwishExtractor;
pub use terabox::TeraboxExtractor;
pub use vidoza::VidozaExtractor;

use async_trait::async_trait;
use tracing::warn;
use url::Url;

use crate::error::{ErrorKind, ExtractError};
use crate::expiry::{self, ExpiryInfo};
use crate::http_client::{Deadline, FetchRequest, FetchResponse, Fetcher};
use crate::models::{MediaLink, PlatformDescriptor};
use crate::token::TokenChain;

/// Framework markers that suggest a host rebuilt its pages.
pub const FRAMEWORK_MARKERS: &[&str] = &[
    "__NEXT_DATA__",
    "/_next/static/",
    "window.__NUXT__",
    "id=\"__nuxt\"",
    "ng-version=",
    "data-reactroot",
];

/// Capability set of one hosting platform.
#[async_trait]
pub trait PlatformExtractor: Send + Sync {
    fn platform_name(&self) -> &'static str;

    /// Structural check of the URL. Must not touch the network.
    fn validate_url(&self, url: &Url) -> bool;

    async fn extract(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError>;
}

/// Everything an extractor may use during one extraction.
pub struct ExtractContext<'a> {
    pub fetcher: &'a Fetcher,
    pub tokens: &'a TokenChain,
    pub descriptor: &'a PlatformDescriptor,
    /// Budget shared by every request this extraction makes.
    pub deadline: Deadline,
}

impl ExtractContext<'_> {
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, ExtractError> {
        Ok(self.fetcher.fetch(request, &self.deadline).await?)
    }

    /// GET a page, classifying client errors and anti-bot interstitials.
    pub async fn get_page(&self, url: &str) -> Result<FetchResponse, ExtractError> {
        let response = self
            .fetch(&FetchRequest::get(url).accept_client_errors())
            .await?;
        check_page_status(&response)?;
        Ok(response)
    }

    /// Expiry from the link's query string, else the platform default lifetime.
    pub fn expiry_for(&self, direct_link: &str) -> Option<ExpiryInfo> {
        expiry::from_url(direct_link).or_else(|| {
            ExpiryInfo::from_lifetime(self.descriptor.default_link_lifetime as i64)
        })
    }

    /// Token for this platform. Required credentials turn a miss into `token_failed`.
    pub async fn token(&self) -> Result<Option<String>, ExtractError> {
        let platform = self.descriptor.extractor.as_str();
        match self.tokens.resolve_token(platform, &self.deadline).await {
            Some(token) => Ok(Some(token.value)),
            None if self.descriptor.requires_credential => Err(ExtractError::new(
                ErrorKind::TokenFailed,
                format!("no valid {} token could be obtained", self.descriptor.name),
            )),
            None => Ok(None),
        }
    }

    /// A token from the network sources, skipping the stored one. Used after
    /// the platform rejected the token it was given.
    pub async fn refresh_token(&self) -> Option<String> {
        let platform = self.descriptor.extractor.as_str();
        self.tokens
            .refresh_token(platform, &self.deadline)
            .await
            .map(|token| token.value)
    }

    /// Failure once every pattern missed: `page_changed` when a marker hints
    /// at a rebuilt page, otherwise `extraction_failed`.
    pub fn pattern_miss(&self, html: &str, markers: &[&str], what: &str) -> ExtractError {
        match scrape::detect_page_change(html, markers) {
            Some(marker) => {
                warn!(
                    "{} page looks changed (found {:?}); best-effort classification",
                    self.descriptor.name, marker
                );
                ExtractError::new(
                    ErrorKind::PageChanged,
                    format!("{} page structure changed, {} not found", self.descriptor.name, what),
                )
            }
            None => ExtractError::extraction_failed(format!("{} not found on page", what)),
        }
    }
}

/// Map page responses that are not usable into error kinds.
pub(crate) fn check_page_status(response: &FetchResponse) -> Result<(), ExtractError> {
    match response.status {
        404 | 410 => Err(ExtractError::not_found("the page does not exist")),
        401 | 403 if scrape::is_challenge_page(&response.body) => Err(ExtractError::new(
            ErrorKind::VerificationRequired,
            "the host answered with a verification challenge",
        )),
        401 | 403 => Err(ExtractError::access_denied(format!(
            "the host refused access (HTTP {})",
            response.status
        ))),
        400..=499 => Err(ExtractError::invalid_link(format!(
            "the host rejected the link (HTTP {})",
            response.status
        ))),
        _ if scrape::is_challenge_page(&response.body) => Err(ExtractError::new(
            ErrorKind::VerificationRequired,
            "the host served a verification challenge",
        )),
        _ => Ok(()),
    }
}

/// First non-empty path segment after `prefix` (e.g. `"e"` for `/e/<id>`).
pub(crate) fn segment_after(url: &Url, prefix: &str) -> Option<String> {
    let mut segments = url.path_segments()?;
    segments.find(|s| *s == prefix)?;
    segments
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// First non-empty path segment.
pub(crate) fn first_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Player source from the page or any packed script in it. Configured
/// player sources beat bare media literals.
pub(crate) fn player_source(html: &str) -> Option<String> {
    let unpacked = packer::unpack_all(html);
    let scripts = std::iter::once(html).chain(unpacked.iter().map(String::as_str));
    let scripts: Vec<&str> = scripts.collect();

    scripts
        .iter()
        .find_map(|s| scrape::find_player_config(s))
        .or_else(|| scripts.iter().find_map(|s| scrape::find_media_literal(s)))
}

pub(crate) fn origin(url: &Url) -> String {
    match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), url.host_str().unwrap_or_default(), port),
        None => format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default()),
    }
}

macro_rules! extractors {
    ($($variant:ident($ty:ident) => $id:literal),+ $(,)?) => {
        /// Every supported extractor variant.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Extractor {
            $($variant($ty)),+
        }

        impl Extractor {
            pub const IDS: &'static [&'static str] = &[$($id),+];

            pub fn from_id(id: &str) -> Option<Self> {
                match id {
                    $($id => Some(Self::$variant($ty)),)+
                    _ => None,
                }
            }

            pub fn id(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => $id),+
                }
            }

            pub fn platform_name(&self) -> &'static str {
                match self {
                    $(Self::$variant(e) => e.platform_name()),+
                }
            }

            pub fn validate_url(&self, url: &Url) -> bool {
                match self {
                    $(Self::$variant(e) => e.validate_url(url)),+
                }
            }

            pub async fn extract(
                &self,
                url: &Url,
                ctx: &ExtractContext<'_>,
            ) -> Result<MediaLink, ExtractError> {
                match self {
                    $(Self::$variant(e) => e.extract(url, ctx).await),+
                }
            }
        }
    };
}

extractors! {
    Terabox(TeraboxExtractor) => "terabox",
    Streamtape(StreamtapeExtractor) => "streamtape",
    Doodstream(DoodstreamExtractor) => "doodstream",
    Mixdrop(MixdropExtractor) => "mixdrop",
    Filemoon(FilemoonExtractor) => "filemoon",
    Streamwish(StreamwishExtractor) => "streamwish",
    Vidoza(VidozaExtractor) => "vidoza",
    Mp4upload(Mp4uploadExtractor) => "mp4upload",
    Krakenfiles(KrakenfilesExtractor) => "krakenfiles",
    Gofile(GofileExtractor) => "gofile",
    Pixeldrain(PixeldrainExtractor) => "pixeldrain",
    Direct(DirectExtractor) => "direct",
}

#[cfg(test)]
pub(crate) mod testing {
    //! Harness for driving one extractor against a scripted transport.

    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::default_platforms;
    use crate::http_client::testing::ScriptedTransport;
    use crate::http_client::RetryPolicy;
    use crate::repository::InMemorySettingsStore;
    use crate::token::TokenConfig;

    pub struct Harness {
        pub transport: Arc<ScriptedTransport>,
        pub fetcher: Fetcher,
        pub tokens: TokenChain,
        pub descriptor: PlatformDescriptor,
    }

    impl Harness {
        pub fn new(extractor_id: &str) -> Self {
            Self::with_token_config(extractor_id, TokenConfig::new())
        }

        pub fn with_token_config(extractor_id: &str, token_config: TokenConfig) -> Self {
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
                token_config,
            );
            let descriptor = default_platforms()
                .into_iter()
                .find(|d| d.extractor == extractor_id)
                .expect("built-in descriptor");
            Self {
                transport,
                fetcher,
                tokens,
                descriptor,
            }
        }

        pub async fn extract(&self, url: &str) -> Result<MediaLink, ExtractError> {
            let extractor = Extractor::from_id(&self.descriptor.extractor).expect("known extractor");
            let url = Url::parse(url).expect("test url");
            let ctx = ExtractContext {
                fetcher: &self.fetcher,
                tokens: &self.tokens,
                descriptor: &self.descriptor,
                deadline: Deadline::after(Duration::from_secs(60)),
            };
            extractor.extract(&url, &ctx).await
        }
    }
}
