//! KrakenFiles.

use async_trait::async_trait;
use url::Url;

use super::{scrape, segment_after, ExtractContext, PlatformExtractor};
use crate::error::ExtractError;
use crate::models::MediaLink;

const PAGE_MARKERS: &[&str] = &["__NEXT_DATA__", "/_next/static/", "data-reactroot"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KrakenfilesExtractor;

fn file_id(url: &Url) -> Option<String> {
    segment_after(url, "view").or_else(|| segment_after(url, "embed-video"))
}

#[async_trait]
impl PlatformExtractor for KrakenfilesExtractor {
    fn platform_name(&self) -> &'static str {
        "KrakenFiles"
    }

    fn validate_url(&self, url: &Url) -> bool {
        file_id(url).is_some()
    }

    async fn extract(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError> {
        let id = file_id(url).ok_or_else(|| ExtractError::invalid_link("no KrakenFiles file id"))?;
        let page = ctx.get_page(url.as_str()).await?;
        let html = &page.body;

        let tag = scrape::find_video_tag(html);
        let source = tag
            .as_ref()
            .map(|t| t.src.clone())
            .or_else(|| scrape::find_initial_state(html).and_then(|s| scrape::media_url_in_state(&s)))
            .or_else(|| scrape::find_media_literal(html));
        let direct = source
            .and_then(|s| scrape::absolutize(url, &s))
            .ok_or_else(|| ctx.pattern_miss(html, PAGE_MARKERS, "KrakenFiles video source"))?;

        let filename = scrape::page_title(html).unwrap_or_else(|| format!("{}.mp4", id));
        let thumbnail = tag
            .and_then(|t| t.poster)
            .and_then(|p| scrape::absolutize(url, &p))
            .or_else(|| scrape::og_image(html));
        let expiry = ctx.expiry_for(&direct);

        Ok(MediaLink::new(filename, direct)
            .with_thumbnail(thumbnail)
            .with_expiry(expiry))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_video_tag() {
        let harness = Harness::new("krakenfiles");
        harness.transport.respond(
            "https://krakenfiles.com/view/",
            200,
            r#"<html><head><meta property="og:title" content="demo 4k.mp4"></head><body><video id="my-video" poster="//krakenfiles.com/poster.jpg"><source src="//s5.krakencloud.example/play/video/abc" type="video/mp4"></video></body></html>"#,
        );
        let link = harness
            .extract("https://krakenfiles.com/view/abc123/file.html")
            .await
            .unwrap();
        assert_eq!(link.direct_link, "https://s5.krakencloud.example/play/video/abc");
        assert_eq!(link.quality, "2160p");
        assert_eq!(link.thumbnail.as_deref(), Some("https://krakenfiles.com/poster.jpg"));
    }

    #[tokio::test]
    async fn test_rebuilt_page_is_page_changed() {
        let harness = Harness::new("krakenfiles");
        harness.transport.respond(
            "https://krakenfiles.com/view/",
            200,
            r#"<html><script src="/_next/static/chunks/main.js"></script><div id="root"></div></html>"#,
        );
        let err = harness
            .extract("https://krakenfiles.com/view/abc123/file.html")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PageChanged);
    }
}
