//! Streamtape.
//!
//! The page assembles the `get_video` URL in JavaScript from a literal prefix
//! and an obfuscated suffix trimmed with chained `substring` calls. A HEAD
//! request then follows the redirect to the CDN file.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};
use url::Url;

use super::scrape;
use super::{segment_after, ExtractContext, PlatformExtractor};
use crate::error::ExtractError;
use crate::http_client::FetchRequest;
use crate::models::MediaLink;

/// Hosts serving the final file after the redirect.
const CDN_HOSTS: &[&str] = &["tapecontent.net", "streamtape.net"];

static ROBOTLINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"getElementById\(\s*['"](?:robotlink|norobotlink|ideoooolink|botlink)['"]\s*\)\.innerHTML\s*=\s*['"]([^'"]+)['"]\s*\+\s*\(?\s*['"]([^'"]+)['"]\s*\)?((?:\.substring\(\s*\d+\s*\))*)"#,
    )
    .unwrap()
});

static SUBSTRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.substring\(\s*(\d+)\s*\)").unwrap());

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamtapeExtractor;

/// Rebuild the `get_video` link from the page script.
pub fn robotlink(html: &str) -> Option<String> {
    let caps = ROBOTLINK.captures(html)?;
    let prefix = &caps[1];
    let mut suffix: &str = &caps[2];
    for skip in SUBSTRING.captures_iter(&caps[3]) {
        let n: usize = skip[1].parse().ok()?;
        suffix = suffix.get(n..).unwrap_or_default();
    }

    let joined = format!("{}{}", prefix, suffix);
    let absolute = if joined.starts_with("//") {
        format!("https:{}", joined)
    } else if joined.starts_with("http") {
        joined
    } else {
        format!("https://{}", joined.trim_start_matches('/'))
    };
    Some(format!("{}&stream=1", absolute))
}

fn is_cdn_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let host = parsed.host_str().unwrap_or_default();
    scrape::has_video_extension(parsed.path()) || CDN_HOSTS.iter().any(|h| host.ends_with(h))
}

fn video_id(url: &Url) -> Option<String> {
    segment_after(url, "v").or_else(|| segment_after(url, "e"))
}

#[async_trait]
impl PlatformExtractor for StreamtapeExtractor {
    fn platform_name(&self) -> &'static str {
        "Streamtape"
    }

    fn validate_url(&self, url: &Url) -> bool {
        video_id(url).is_some()
    }

    async fn extract(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError> {
        let page = ctx.get_page(url.as_str()).await?;
        let html = &page.body;

        if html.contains("Video not found") {
            return Err(ExtractError::not_found("Streamtape reports the video as removed"));
        }

        let Some(get_video) = robotlink(html) else {
            return Err(ctx.pattern_miss(html, super::FRAMEWORK_MARKERS, "Streamtape video link"));
        };
        debug!("Streamtape get_video link: {}", get_video);

        let filename = scrape::page_title(html)
            .or_else(|| video_id(url).map(|id| format!("{}.mp4", id)))
            .unwrap_or_else(|| "video.mp4".to_string());
        let thumbnail = scrape::og_image(html);

        let probe = FetchRequest::head(&get_video).referer(url.as_str());
        let resolved = match ctx.fetch(&probe).await {
            Ok(response) if is_cdn_url(&response.effective_url) => Some(response),
            Ok(response) => {
                warn!(
                    "Streamtape redirect landed on unexpected URL {}",
                    response.effective_url
                );
                None
            }
            Err(e) => {
                warn!("Streamtape redirect probe failed: {}", e);
                None
            }
        };

        let link = match resolved {
            Some(response) => MediaLink::new(filename, response.effective_url.clone())
                .with_size(response.content_length()),
            None => MediaLink::new(filename, get_video).low_confidence(),
        };

        let expiry = ctx.expiry_for(&link.direct_link);
        Ok(link.with_thumbnail(thumbnail).with_expiry(expiry))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use crate::error::ErrorKind;
    use crate::http_client::testing::Scripted;
    use crate::http_client::FetchResponse;

    const PAGE: &str = r#"<html><head><meta property="og:title" content="trip.720p.mp4"></head><body>
<div id="robotlink">//streamtape.com/get_video?id=abc&expires=1&ip=x&token=xyz</div>
<script>document.getElementById('robotlink').innerHTML = '//streamtape.com/get_vid'+ ('xcdeo?id=abc&expires=1&ip=x&token=real').substring(1).substring(2);</script>
</body></html>"#;

    #[test]
    fn test_robotlink_applies_substrings() {
        assert_eq!(
            robotlink(PAGE).as_deref(),
            Some("https://streamtape.com/get_video?id=abc&expires=1&ip=x&token=real&stream=1")
        );
        assert!(robotlink("<html></html>").is_none());
    }

    #[tokio::test]
    async fn test_follows_redirect_to_cdn() {
        let harness = Harness::new("streamtape");
        harness.transport.respond("https://streamtape.com/v/", 200, PAGE);
        harness.transport.push(
            "https://streamtape.com/get_video",
            Scripted::Respond(
                FetchResponse::new(200, "", "https://abc.tapecontent.net/radosgw/abc/trip.mp4?stream=1")
                    .with_header("content-length", "2048"),
            ),
        );

        let link = harness.extract("https://streamtape.com/v/abc/trip").await.unwrap();
        assert_eq!(link.direct_link, "https://abc.tapecontent.net/radosgw/abc/trip.mp4?stream=1");
        assert_eq!(link.filename, "trip.720p.mp4");
        assert_eq!(link.quality, "720p");
        assert_eq!(link.size_bytes, Some(2048));
        assert!(!link.low_confidence);
        assert!(link.expiry.is_some());
    }

    #[tokio::test]
    async fn test_unexpected_redirect_is_low_confidence() {
        let harness = Harness::new("streamtape");
        harness.transport.respond("https://streamtape.com/v/", 200, PAGE);
        harness
            .transport
            .respond("https://streamtape.com/get_video", 200, "<html>ad</html>");

        let link = harness.extract("https://streamtape.com/v/abc").await.unwrap();
        assert!(link.low_confidence);
        assert!(link.direct_link.ends_with("&stream=1"));
    }

    #[tokio::test]
    async fn test_removed_video() {
        let harness = Harness::new("streamtape");
        harness
            .transport
            .respond("https://streamtape.com/e/", 200, "<h1>Video not found</h1>");
        let err = harness.extract("https://streamtape.com/e/gone").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::FileNotFound);
    }
}
