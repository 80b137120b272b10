//! Mp4Upload.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use super::{first_segment, player_source, scrape, ExtractContext, PlatformExtractor};
use crate::error::ExtractError;
use crate::models::MediaLink;

static FILE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:embed-)?([a-z0-9]{12})(?:\.html)?$").unwrap());

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mp4uploadExtractor;

fn file_code(url: &Url) -> Option<String> {
    let segment = first_segment(url)?;
    FILE_SEGMENT.captures(&segment).map(|c| c[1].to_string())
}

#[async_trait]
impl PlatformExtractor for Mp4uploadExtractor {
    fn platform_name(&self) -> &'static str {
        "Mp4Upload"
    }

    fn validate_url(&self, url: &Url) -> bool {
        file_code(url).is_some()
    }

    async fn extract(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError> {
        let code = file_code(url).ok_or_else(|| ExtractError::invalid_link("no Mp4Upload file code"))?;
        let embed_url = format!("https://www.mp4upload.com/embed-{}.html", code);
        let page = ctx.get_page(&embed_url).await?;
        let html = &page.body;

        if html.contains("File Not Found") || html.contains("File was deleted") {
            return Err(ExtractError::not_found("Mp4Upload reports the file as removed"));
        }

        let direct = player_source(html)
            .and_then(|s| scrape::absolutize(url, &s))
            .ok_or_else(|| ctx.pattern_miss(html, super::FRAMEWORK_MARKERS, "Mp4Upload player source"))?;

        let filename = Url::parse(&direct)
            .ok()
            .as_ref()
            .and_then(scrape::filename_from_url)
            .filter(|f| scrape::has_video_extension(f))
            .or_else(|| scrape::page_title(html))
            .unwrap_or_else(|| format!("{}.mp4", code));
        let expiry = ctx.expiry_for(&direct);

        Ok(MediaLink::new(filename, direct)
            .with_thumbnail(scrape::og_image(html))
            .with_expiry(expiry))
    }
}
