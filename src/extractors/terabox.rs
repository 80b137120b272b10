//! TeraBox and its mirror domains.
//!
//! Share links look like `/s/1<code>` or `/sharing/link?surl=<code>`. The
//! `share/list` API needs the page-embedded `jsToken`, so a token is
//! resolved first. API hosts are tried in turn; the share page's hydration
//! state is the last resort.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::scrape::{self, json_i64, json_str, json_u64};
use super::{origin, ExtractContext, PlatformExtractor};
use crate::error::{ErrorKind, ExtractError};
use crate::http_client::FetchRequest;
use crate::models::MediaLink;

/// API hosts tried after the share link's own host.
const API_BASES: &[&str] = &[
    "https://www.terabox.app",
    "https://www.terabox.com",
    "https://www.1024terabox.com",
];

const PAGE_MARKERS: &[&str] = &["window.__NUXT__", "id=\"__nuxt\"", "ng-version="];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeraboxExtractor;

/// Share code from `/s/1<code>` or the `surl` query parameter.
pub fn share_code(url: &Url) -> Option<String> {
    if let Some((_, surl)) = url.query_pairs().find(|(k, _)| k == "surl") {
        let surl = surl.trim().to_string();
        if !surl.is_empty() {
            return Some(surl);
        }
    }

    let mut segments = url.path_segments()?;
    segments.find(|s| *s == "s")?;
    let code = segments.next().filter(|s| s.len() > 1)?;
    // `/s/` links carry a leading `1` that the API omits
    Some(code.strip_prefix('1').unwrap_or(code).to_string())
}

/// Classify a non-zero `errno`.
fn errno_error(errno: i64, body: &Value) -> Option<ExtractError> {
    let message = json_str(body.get("errmsg"))
        .or_else(|| json_str(body.get("show_msg")))
        .unwrap_or_else(|| format!("errno {}", errno));
    let error = match errno {
        -9 | 2 | 105 | 115 | 145 => ExtractError::not_found(message),
        -12 | 140 | 9019 => ExtractError::access_denied(message),
        -6 | 4000023 => ExtractError::new(ErrorKind::TokenFailed, message),
        400141 | 400210 | 4000020 | 9013 => {
            ExtractError::new(ErrorKind::VerificationRequired, message)
                .with_retry_hint("TeraBox is asking for verification")
        }
        -1 | 112 => ExtractError::invalid_link(message),
        _ => return None,
    };
    Some(error)
}

/// The first file entry of a `share/list` response.
fn media_from_list(list: &[Value]) -> Option<MediaLink> {
    let entry = list
        .iter()
        .find(|e| json_i64(e.get("isdir")).unwrap_or(0) == 0)?;
    let dlink = json_str(entry.get("dlink"))?;
    let filename = json_str(entry.get("server_filename")).unwrap_or_else(|| "video".to_string());
    let thumbnail = entry.get("thumbs").and_then(|t| {
        ["url3", "url2", "url1", "icon"]
            .iter()
            .find_map(|k| json_str(t.get(*k)))
    });

    Some(
        MediaLink::new(filename, dlink)
            .with_size(json_u64(entry.get("size")))
            .with_thumbnail(thumbnail),
    )
}

impl TeraboxExtractor {
    fn list_url(base: &str, code: &str, token: Option<&str>) -> String {
        format!(
            "{}/share/list?app_id=250528&web=1&channel=dubox&clienttype=0&jsToken={}&page=1&num=20&by=name&order=asc&site_referer=&shorturl={}&root=1",
            base,
            token.unwrap_or_default(),
            urlencoding::encode(code)
        )
    }

    async fn from_api(
        &self,
        url: &Url,
        code: &str,
        token: Option<&str>,
        ctx: &ExtractContext<'_>,
    ) -> Result<Option<MediaLink>, ExtractError> {
        let own = origin(url);
        let mut bases: Vec<&str> = vec![own.as_str()];
        bases.extend(API_BASES.iter().copied().filter(|b| *b != own));

        let mut last_error = None;
        for base in bases {
            let request = FetchRequest::get(Self::list_url(base, code, token))
                .referer(url.as_str())
                .header("Accept", "application/json");
            let response = match ctx.fetch(&request).await {
                Ok(r) => r,
                Err(e) => {
                    debug!("TeraBox API {} unreachable: {}", base, e);
                    last_error = Some(e);
                    continue;
                }
            };

            let body: Value = match response.json() {
                Ok(v) => v,
                Err(e) => {
                    debug!("TeraBox API {} returned non-JSON: {}", base, e);
                    continue;
                }
            };

            let errno = json_i64(body.get("errno")).unwrap_or(0);
            if errno != 0 {
                if let Some(error) = errno_error(errno, &body) {
                    return Err(error);
                }
                debug!("TeraBox API {} answered errno {}", base, errno);
                last_error = Some(ExtractError::extraction_failed(format!(
                    "TeraBox API answered errno {}",
                    errno
                )));
                continue;
            }

            let list = body
                .get("list")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            if let Some(link) = media_from_list(list) {
                return Ok(Some(link));
            }
            if list.is_empty() {
                return Err(ExtractError::not_found("the share contains no files"));
            }
            debug!("TeraBox API {} listed no playable file", base);
        }

        match last_error {
            Some(e) if e.kind == ErrorKind::ConnectionFailed => Err(e),
            _ => Ok(None),
        }
    }

    /// After a token rejection, list once more with a freshly fetched token.
    /// A refresh that yields the rejected token again keeps the original error.
    async fn retry_with_fresh_token(
        &self,
        url: &Url,
        code: &str,
        rejected: Option<&str>,
        error: ExtractError,
        ctx: &ExtractContext<'_>,
    ) -> Result<Option<MediaLink>, ExtractError> {
        warn!("TeraBox rejected the token ({}), refreshing", error.message);
        match ctx.refresh_token().await {
            Some(fresh) if Some(fresh.as_str()) != rejected => {
                self.from_api(url, code, Some(&fresh), ctx).await
            }
            _ => Err(error),
        }
    }

    async fn from_share_page(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError> {
        let page = ctx.get_page(url.as_str()).await?;
        let html = &page.body;

        if let Some(state) = scrape::find_initial_state(html) {
            if let Some(list) = scrape::find_key(&state, "list").and_then(Value::as_array) {
                if let Some(link) = media_from_list(list) {
                    return Ok(link);
                }
            }
            if let Some(dlink) = scrape::media_url_in_state(&state) {
                let filename = scrape::find_key(&state, "server_filename")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| scrape::page_title(html))
                    .unwrap_or_else(|| "video".to_string());
                return Ok(MediaLink::new(filename, dlink));
            }
        }

        Err(ctx.pattern_miss(html, PAGE_MARKERS, "TeraBox download link"))
    }
}

#[async_trait]
impl PlatformExtractor for TeraboxExtractor {
    fn platform_name(&self) -> &'static str {
        "TeraBox"
    }

    fn validate_url(&self, url: &Url) -> bool {
        share_code(url).is_some()
    }

    async fn extract(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError> {
        let code = share_code(url)
            .ok_or_else(|| ExtractError::invalid_link("no share code in TeraBox link"))?;
        let token = ctx.token().await?;

        let listed = match self.from_api(url, &code, token.as_deref(), ctx).await {
            Err(e) if e.kind == ErrorKind::TokenFailed => {
                self.retry_with_fresh_token(url, &code, token.as_deref(), e, ctx)
                    .await?
            }
            other => other?,
        };
        let link = match listed {
            Some(link) => link,
            None => self.from_share_page(url, ctx).await?,
        };

        let expiry = ctx.expiry_for(&link.direct_link);
        Ok(link.with_expiry(expiry))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use crate::token::TokenConfig;

    fn token_config() -> TokenConfig {
        let mut config = TokenConfig::new();
        config.fallback = Some("ab".repeat(40));
        config
    }

    #[test]
    fn test_share_code_forms() {
        let url = Url::parse("https://www.terabox.com/s/1AbCdEf").unwrap();
        assert_eq!(share_code(&url).as_deref(), Some("AbCdEf"));
        let url = Url::parse("https://www.terabox.app/sharing/link?surl=XyZ").unwrap();
        assert_eq!(share_code(&url).as_deref(), Some("XyZ"));
        let url = Url::parse("https://www.terabox.com/main").unwrap();
        assert!(share_code(&url).is_none());
    }

    #[tokio::test]
    async fn test_api_success() {
        let harness = Harness::with_token_config("terabox", token_config());
        let expire = chrono::Utc::now().timestamp() + 3600;
        harness.transport.respond(
            "https://www.terabox.com/share/list",
            200,
            &format!(
                r#"{{"errno":0,"list":[{{"isdir":"0","server_filename":"movie.1080p.mp4","dlink":"https://d.terabox.com/file/x?expire={}","size":"104857600","thumbs":{{"url3":"https://thumb.example/3.jpg"}}}}]}}"#,
                expire
            ),
        );

        let link = harness.extract("https://www.terabox.com/s/1abc").await.unwrap();
        assert_eq!(link.filename, "movie.1080p.mp4");
        assert_eq!(link.quality, "1080p");
        assert_eq!(link.size_bytes, Some(104_857_600));
        assert_eq!(link.thumbnail.as_deref(), Some("https://thumb.example/3.jpg"));
        let expiry = link.expiry.unwrap();
        assert!((expiry.expires_in - 3600).abs() <= 2);

        let sent = harness.transport.requests();
        assert!(sent[0].request.url.contains("shorturl=abc"));
        assert!(sent[0].request.url.contains(&"ab".repeat(40)));
    }

    #[tokio::test]
    async fn test_errno_classification() {
        let harness = Harness::with_token_config("terabox", token_config());
        harness
            .transport
            .respond("https://www.terabox.com/share/list", 200, r#"{"errno":-9}"#);
        let err = harness.extract("https://www.terabox.com/s/1gone").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::FileNotFound);

        let harness = Harness::with_token_config("terabox", token_config());
        harness.transport.respond(
            "https://www.terabox.com/share/list",
            200,
            r#"{"errno":400141,"errmsg":"need verify"}"#,
        );
        let err = harness.extract("https://www.terabox.com/s/1busy").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::VerificationRequired);
        assert!(err.retry_hint.is_some());
    }

    const LIST_PREFIX: &str = "https://www.terabox.com/share/list?app_id=250528&web=1&channel=dubox&clienttype=0&jsToken=";

    #[tokio::test]
    async fn test_rejected_token_is_refreshed_once() {
        let mut config = TokenConfig::new();
        config.endpoint = Some("https://tokens.example/terabox".to_string());
        let harness = Harness::with_token_config("terabox", config);
        let (old, fresh) = ("a".repeat(64), "b".repeat(64));
        harness
            .transport
            .respond("https://tokens.example/", 200, &format!(r#"{{"token":"{}"}}"#, old));
        harness
            .transport
            .respond("https://tokens.example/", 200, &format!(r#"{{"token":"{}"}}"#, fresh));
        harness.transport.respond(
            &format!("{}{}", LIST_PREFIX, old),
            200,
            r#"{"errno":-6,"errmsg":"invalid jsToken"}"#,
        );
        harness.transport.respond(
            &format!("{}{}", LIST_PREFIX, fresh),
            200,
            r#"{"errno":0,"list":[{"isdir":0,"server_filename":"clip.mp4","dlink":"https://d.terabox.com/file/z"}]}"#,
        );

        let link = harness.extract("https://www.terabox.com/s/1abc").await.unwrap();
        assert_eq!(link.filename, "clip.mp4");

        let urls: Vec<String> = harness
            .transport
            .requests()
            .into_iter()
            .map(|r| r.request.url)
            .collect();
        assert_eq!(urls.len(), 4);
        assert!(urls[1].contains(&old));
        assert!(urls[3].contains(&fresh));
    }

    #[tokio::test]
    async fn test_rejected_token_without_replacement_fails() {
        let harness = Harness::with_token_config("terabox", token_config());
        harness.transport.respond(
            "https://www.terabox.com/share/list",
            200,
            r#"{"errno":4000023,"errmsg":"need jsToken"}"#,
        );

        let err = harness.extract("https://www.terabox.com/s/1abc").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenFailed);
        // the fallback is the same token, so the listing is not repeated
        assert_eq!(harness.transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_network() {
        let harness = Harness::new("terabox");
        let err = harness.extract("https://www.terabox.com/s/1abc").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TokenFailed);
        assert!(harness.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_share_page_state() {
        let harness = Harness::with_token_config("terabox", token_config());
        for base in ["https://www.terabox.com/share/list", "https://www.terabox.app/share/list", "https://www.1024terabox.com/share/list"] {
            harness.transport.respond(base, 200, r#"{"errno":31034}"#);
        }
        harness.transport.respond(
            "https://www.terabox.com/s/",
            200,
            r#"<script>locals.mset({"file_list":{"list":[{"isdir":0,"server_filename":"clip.mp4","dlink":"https://d.terabox.com/file/y"}]}});</script>"#,
        );

        let link = harness.extract("https://www.terabox.com/s/1abc").await.unwrap();
        assert_eq!(link.filename, "clip.mp4");
        assert_eq!(link.direct_link, "https://d.terabox.com/file/y");
        // no expiry in the link, so the 4h platform default applies
        assert!((link.expiry.unwrap().expires_in - 4 * 3600).abs() <= 2);
    }

    #[tokio::test]
    async fn test_page_change_detected_after_patterns_fail() {
        let harness = Harness::with_token_config("terabox", token_config());
        for base in ["https://www.terabox.com/share/list", "https://www.terabox.app/share/list", "https://www.1024terabox.com/share/list"] {
            harness.transport.respond(base, 200, r#"{"errno":31034}"#);
        }
        harness.transport.respond(
            "https://www.terabox.com/s/",
            200,
            r#"<html><div id="__nuxt"></div><script>window.__NUXT__=(function(a){return {}})(1)</script></html>"#,
        );

        let err = harness.extract("https://www.terabox.com/s/1abc").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PageChanged);
    }
}
