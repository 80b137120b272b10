//! Vidoza.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use super::{first_segment, player_source, scrape, ExtractContext, PlatformExtractor};
use crate::error::ExtractError;
use crate::models::MediaLink;

static FILE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:embed-)?([a-z0-9]{8,})(?:\.html)?$").unwrap());

static CUR_FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"curFileName\s*=\s*["']([^"']+)["']"#).unwrap());

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VidozaExtractor;

fn file_code(url: &Url) -> Option<String> {
    let segment = first_segment(url)?;
    FILE_SEGMENT
        .captures(&segment)
        .map(|c| c[1].to_string())
}

#[async_trait]
impl PlatformExtractor for VidozaExtractor {
    fn platform_name(&self) -> &'static str {
        "Vidoza"
    }

    fn validate_url(&self, url: &Url) -> bool {
        file_code(url).is_some()
    }

    async fn extract(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError> {
        let code = file_code(url).ok_or_else(|| ExtractError::invalid_link("no Vidoza file code"))?;
        let page = ctx.get_page(url.as_str()).await?;
        let html = &page.body;

        if html.contains("File was deleted") || html.contains("Reason for deletion") {
            return Err(ExtractError::not_found("Vidoza reports the file as deleted"));
        }

        let tag = scrape::find_video_tag(html);
        let source = player_source(html).or_else(|| tag.as_ref().map(|t| t.src.clone()));
        let direct = source
            .and_then(|s| scrape::absolutize(url, &s))
            .ok_or_else(|| ctx.pattern_miss(html, super::FRAMEWORK_MARKERS, "Vidoza video source"))?;

        let filename = CUR_FILE_NAME
            .captures(html)
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| scrape::page_title(html))
            .unwrap_or_else(|| format!("{}.mp4", code));
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
