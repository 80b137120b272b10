//! StreamWish and its mirrors.

use async_trait::async_trait;
use url::Url;

use super::{first_segment, player_source, scrape, segment_after, ExtractContext, PlatformExtractor};
use crate::error::ExtractError;
use crate::models::MediaLink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamwishExtractor;

fn video_id(url: &Url) -> Option<String> {
    segment_after(url, "e")
        .or_else(|| segment_after(url, "f"))
        .or_else(|| first_segment(url).filter(|s| s.len() >= 8 && s.chars().all(|c| c.is_ascii_alphanumeric())))
}

#[async_trait]
impl PlatformExtractor for StreamwishExtractor {
    fn platform_name(&self) -> &'static str {
        "StreamWish"
    }

    fn validate_url(&self, url: &Url) -> bool {
        video_id(url).is_some()
    }

    async fn extract(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError> {
        let id = video_id(url).ok_or_else(|| ExtractError::invalid_link("no StreamWish video id"))?;
        let page = ctx.get_page(url.as_str()).await?;
        let html = &page.body;

        if html.contains("File is no longer available") || html.contains("File Not Found") {
            return Err(ExtractError::not_found("StreamWish reports the file as removed"));
        }

        let direct = player_source(html)
            .and_then(|src| scrape::absolutize(url, &src))
            .ok_or_else(|| ctx.pattern_miss(html, super::FRAMEWORK_MARKERS, "StreamWish player source"))?;

        let filename = scrape::page_title(html).unwrap_or_else(|| format!("{}.mp4", id));
        let expiry = ctx.expiry_for(&direct);
        Ok(MediaLink::new(filename, direct)
            .with_thumbnail(scrape::og_image(html))
            .with_expiry(expiry))
    }
}
