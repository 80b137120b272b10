//! DoodStream and its many mirror domains.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;
use url::Url;

use super::scrape;
use super::{origin, segment_after, ExtractContext, PlatformExtractor};
use crate::error::ExtractError;
use crate::http_client::FetchRequest;
use crate::models::MediaLink;

static PASS_MD5: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"/pass_md5/[A-Za-z0-9_\-/]+"#).unwrap());

const TITLE_SUFFIXES: &[&str] = &[" - DoodStream", " - Dood", " - dood"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoodstreamExtractor;

fn video_id(url: &Url) -> Option<String> {
    segment_after(url, "e").or_else(|| segment_after(url, "d"))
}

/// Final link: pass_md5 body, ten random characters, then the token query.
pub fn build_link(base: &str, pass_path: &str, now_ms: i64) -> String {
    let token = pass_path.rsplit('/').next().unwrap_or_default();
    let noise: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("{}{}?token={}&expiry={}", base.trim(), noise, token, now_ms)
}

fn clean_title(title: String) -> String {
    TITLE_SUFFIXES
        .iter()
        .find_map(|s| title.strip_suffix(s))
        .map(str::to_string)
        .unwrap_or(title)
}

#[async_trait]
impl PlatformExtractor for DoodstreamExtractor {
    fn platform_name(&self) -> &'static str {
        "DoodStream"
    }

    fn validate_url(&self, url: &Url) -> bool {
        video_id(url).is_some()
    }

    async fn extract(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError> {
        let id = video_id(url).ok_or_else(|| ExtractError::invalid_link("no DoodStream video id"))?;
        // The embed page carries the player script even for /d/ links
        let embed_url = format!("{}/e/{}", origin(url), id);
        let page = ctx.get_page(&embed_url).await?;
        let html = &page.body;

        if html.contains("Video not found") || html.contains("File was deleted") {
            return Err(ExtractError::not_found("DoodStream reports the video as removed"));
        }

        let Some(pass_path) = PASS_MD5.find(html).map(|m| m.as_str().to_string()) else {
            return Err(ctx.pattern_miss(html, super::FRAMEWORK_MARKERS, "DoodStream pass_md5 path"));
        };

        let page_origin = Url::parse(&page.effective_url)
            .map(|u| origin(&u))
            .unwrap_or_else(|_| origin(url));
        let response = ctx
            .fetch(&FetchRequest::get(format!("{}{}", page_origin, pass_path)).referer(&embed_url))
            .await?;
        let base = response.body.trim();
        if !base.starts_with("http") {
            return Err(ExtractError::extraction_failed(
                "DoodStream pass_md5 did not return a URL prefix",
            ));
        }

        let filename = scrape::page_title(html)
            .map(clean_title)
            .unwrap_or_else(|| format!("{}.mp4", id));
        let direct = build_link(base, &pass_path, Utc::now().timestamp_millis());
        let thumbnail = scrape::og_image(html);
        let expiry = ctx.expiry_for(&direct);

        Ok(MediaLink::new(filename, direct)
            .with_thumbnail(thumbnail)
            .with_expiry(expiry))
    }
}
