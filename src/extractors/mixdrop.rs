//! MixDrop.
//!
//! The embed page hides `MDCore.wurl` inside a packed script; some mirrors
//! leave it in the clear.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use url::Url;

use super::{origin, packer, scrape, segment_after, ExtractContext, PlatformExtractor};
use crate::error::ExtractError;
use crate::models::MediaLink;

static WURL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"MDCore\.wurl\s*=\s*["']([^"']+)["']"#).unwrap());

static POSTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"MDCore\.poster\s*=\s*["']([^"']+)["']"#).unwrap());

const REMOVED_MARKERS: &[&str] = &["WE ARE SORRY", "can't find the file", "File not found"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixdropExtractor;

fn video_id(url: &Url) -> Option<String> {
    segment_after(url, "e").or_else(|| segment_after(url, "f"))
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|c| scrape::unescape_js(&c[1]))
}

#[async_trait]
impl PlatformExtractor for MixdropExtractor {
    fn platform_name(&self) -> &'static str {
        "MixDrop"
    }

    fn validate_url(&self, url: &Url) -> bool {
        video_id(url).is_some()
    }

    async fn extract(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError> {
        let id = video_id(url).ok_or_else(|| ExtractError::invalid_link("no MixDrop video id"))?;
        let embed_url = format!("{}/e/{}", origin(url), id);
        let page = ctx.get_page(&embed_url).await?;
        let html = &page.body;

        if REMOVED_MARKERS.iter().any(|m| html.contains(m)) {
            return Err(ExtractError::not_found("MixDrop reports the file as removed"));
        }

        let mut scripts = packer::unpack_all(html);
        scripts.push(html.clone());

        let Some((wurl, poster)) = scripts
            .iter()
            .find_map(|s| capture(&WURL, s).map(|w| (w, capture(&POSTER, s))))
        else {
            return Err(ctx.pattern_miss(html, super::FRAMEWORK_MARKERS, "MixDrop video URL"));
        };

        let base = Url::parse(&embed_url).map_err(|e| ExtractError::invalid_link(e.to_string()))?;
        let direct = scrape::absolutize(&base, &wurl)
            .ok_or_else(|| ExtractError::extraction_failed("MixDrop video URL is empty"))?;
        let thumbnail = poster.and_then(|p| scrape::absolutize(&base, &p));
        let filename = scrape::page_title(html)
            .filter(|t| !t.eq_ignore_ascii_case("mixdrop"))
            .unwrap_or_else(|| format!("{}.mp4", id));
        let expiry = ctx.expiry_for(&direct);

        Ok(MediaLink::new(filename, direct)
            .with_thumbnail(thumbnail)
            .with_expiry(expiry))
    }
}
