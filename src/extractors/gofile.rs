//! Gofile.
//!
//! Content is listed through the public API after creating a guest account.
//! A share may be a single file or a folder; the first video file wins.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::scrape::{self, json_str, json_u64};
use super::{segment_after, ExtractContext, PlatformExtractor};
use crate::error::{ErrorKind, ExtractError};
use crate::http_client::FetchRequest;
use crate::models::MediaLink;

const API_BASE: &str = "https://api.gofile.io";

/// Website token the web client sends with content requests.
const WEBSITE_TOKEN: &str = "4fd6sg89d7s6";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GofileExtractor;

fn content_code(url: &Url) -> Option<String> {
    segment_after(url, "d")
}

/// Map an API `status` other than `ok`.
fn status_error(status: &str) -> ExtractError {
    match status {
        "error-notFound" => ExtractError::not_found("Gofile content does not exist"),
        "error-passwordRequired" | "error-notPublic" | "error-notPremium" => {
            ExtractError::access_denied(format!("Gofile refused access ({})", status))
        }
        "error-rateLimit" => ExtractError::new(ErrorKind::VerificationRequired, "Gofile is rate limiting")
            .with_retry_hint("Gofile rate limit, retry in a few minutes"),
        other => ExtractError::extraction_failed(format!("Gofile API answered {}", other)),
    }
}

fn is_video_entry(entry: &Value) -> bool {
    let mime = json_str(entry.get("mimetype")).unwrap_or_default();
    let name = json_str(entry.get("name")).unwrap_or_default();
    mime.starts_with("video/") || scrape::has_video_extension(&name)
}

/// The file entry to resolve: the content itself, or the first video child.
pub fn pick_file(data: &Value) -> Option<&Value> {
    if data.get("type").and_then(Value::as_str) == Some("file") {
        return Some(data);
    }
    let children: Vec<&Value> = data
        .get("children")
        .and_then(Value::as_object)
        .map(|m| m.values().filter(|c| c.get("type").and_then(Value::as_str) == Some("file")).collect())
        .unwrap_or_default();

    children
        .iter()
        .copied()
        .find(|c| is_video_entry(c))
        .or_else(|| children.first().copied())
}

impl GofileExtractor {
    async fn guest_token(&self, ctx: &ExtractContext<'_>) -> Result<String, ExtractError> {
        let response = ctx
            .fetch(&FetchRequest::post_form(format!("{}/accounts", API_BASE), &[]))
            .await?;
        let body: Value = response
            .json()
            .map_err(|e| ExtractError::new(ErrorKind::TokenFailed, format!("Gofile account response: {}", e)))?;
        json_str(body.get("data").and_then(|d| d.get("token")))
            .ok_or_else(|| ExtractError::new(ErrorKind::TokenFailed, "Gofile returned no guest token"))
    }
}

#[async_trait]
impl PlatformExtractor for GofileExtractor {
    fn platform_name(&self) -> &'static str {
        "Gofile"
    }

    fn validate_url(&self, url: &Url) -> bool {
        content_code(url).is_some()
    }

    async fn extract(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError> {
        let code = content_code(url).ok_or_else(|| ExtractError::invalid_link("no Gofile content code"))?;
        let token = self.guest_token(ctx).await?;

        let request = FetchRequest::get(format!(
            "{}/contents/{}?wt={}",
            API_BASE,
            urlencoding::encode(&code),
            WEBSITE_TOKEN
        ))
        .bearer(&token)
        .accept_client_errors();
        let response = ctx.fetch(&request).await?;
        let body: Value = response
            .json()
            .map_err(|e| ExtractError::extraction_failed(format!("Gofile contents response: {}", e)))?;

        let status = body.get("status").and_then(Value::as_str).unwrap_or("error-unknown");
        if status != "ok" {
            return Err(status_error(status));
        }
        if response.status == 404 {
            return Err(ExtractError::not_found("Gofile content does not exist"));
        }

        let data = body.get("data").unwrap_or(&Value::Null);
        let file = pick_file(data)
            .ok_or_else(|| ExtractError::not_found("the Gofile folder holds no files"))?;
        let direct = json_str(file.get("link"))
            .ok_or_else(|| ExtractError::extraction_failed("Gofile file has no download link"))?;
        let filename = json_str(file.get("name")).unwrap_or_else(|| format!("{}.mp4", code));
        debug!("Gofile resolved {} to {}", code, filename);

        let expiry = ctx.expiry_for(&direct);
        Ok(MediaLink::new(filename, direct)
            .with_size(json_u64(file.get("size")))
            .with_thumbnail(json_str(file.get("thumbnail")))
            .with_expiry(expiry))
    }
}
