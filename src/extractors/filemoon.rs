//! Filemoon.
//!
//! The player setup lives in a packed script, sometimes inside an iframe
//! served from a sibling domain.

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::{player_source, scrape, segment_after, ExtractContext, PlatformExtractor};
use crate::error::ExtractError;
use crate::models::MediaLink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilemoonExtractor;

fn video_id(url: &Url) -> Option<String> {
    segment_after(url, "e").or_else(|| segment_after(url, "d"))
}

fn iframe_src(html: &str) -> Option<String> {
    let document = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("iframe[src]").ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("src"))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl PlatformExtractor for FilemoonExtractor {
    fn platform_name(&self) -> &'static str {
        "Filemoon"
    }

    fn validate_url(&self, url: &Url) -> bool {
        video_id(url).is_some()
    }

    async fn extract(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError> {
        let id = video_id(url).ok_or_else(|| ExtractError::invalid_link("no Filemoon video id"))?;
        let page = ctx.get_page(url.as_str()).await?;
        let mut html = page.body.clone();
        let title = scrape::page_title(&html);

        if player_source(&html).is_none() {
            if let Some(frame) = iframe_src(&html).and_then(|src| scrape::absolutize(url, &src)) {
                debug!("Filemoon player is framed at {}", frame);
                html = ctx.get_page(&frame).await?.body;
            }
        }

        let Some(source) = player_source(&html) else {
            return Err(ctx.pattern_miss(&html, super::FRAMEWORK_MARKERS, "Filemoon player source"));
        };
        let direct = scrape::absolutize(url, &source)
            .ok_or_else(|| ExtractError::extraction_failed("Filemoon player source is empty"))?;

        let filename = title.unwrap_or_else(|| format!("{}.mp4", id));
        let expiry = ctx.expiry_for(&direct);
        Ok(MediaLink::new(filename, direct)
            .with_thumbnail(scrape::og_image(&page.body))
            .with_expiry(expiry))
    }
}
