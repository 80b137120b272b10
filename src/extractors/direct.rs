//! Direct media URLs on any host.
//!
//! Claims links whose path already ends in a video extension and confirms
//! them with a HEAD probe. Direct links are treated as durable and never
//! carry an expiry, even when the URL has an expiry-like parameter.

use async_trait::async_trait;
use url::Url;

use super::{scrape, ExtractContext, PlatformExtractor};
use crate::error::ExtractError;
use crate::http_client::FetchRequest;
use crate::models::MediaLink;

/// Content types accepted as playable.
const MEDIA_TYPES: &[&str] = &[
    "video/",
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "application/dash+xml",
    "application/octet-stream",
    "binary/octet-stream",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectExtractor;

fn is_media_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    MEDIA_TYPES.iter().any(|t| lower.starts_with(t))
}

#[async_trait]
impl PlatformExtractor for DirectExtractor {
    fn platform_name(&self) -> &'static str {
        "Direct"
    }

    fn validate_url(&self, url: &Url) -> bool {
        scrape::has_video_extension(url.path())
    }

    async fn extract(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError> {
        let response = ctx
            .fetch(&FetchRequest::head(url.as_str()).accept_client_errors())
            .await?;
        match response.status {
            404 | 410 => return Err(ExtractError::not_found("the file does not exist")),
            401 | 403 => {
                return Err(ExtractError::access_denied(format!(
                    "the host refused access (HTTP {})",
                    response.status
                )))
            }
            400..=499 => {
                return Err(ExtractError::invalid_link(format!(
                    "the host rejected the link (HTTP {})",
                    response.status
                )))
            }
            _ => {}
        }

        if let Some(content_type) = response.content_type() {
            if !is_media_type(content_type) {
                return Err(ExtractError::extraction_failed(format!(
                    "the link serves {} rather than video",
                    content_type
                )));
            }
        }

        let final_url = Url::parse(&response.effective_url)
            .ok()
            .filter(|u| u.scheme().starts_with("http"))
            .unwrap_or_else(|| url.clone());
        let filename = response
            .content_disposition_filename()
            .or_else(|| scrape::filename_from_url(&final_url))
            .unwrap_or_else(|| "video".to_string());

        Ok(MediaLink::new(filename, final_url.as_str()).with_size(response.content_length()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use crate::error::ErrorKind;
    use crate::http_client::testing::Scripted;
    use crate::http_client::FetchResponse;

    #[test]
    fn test_validate_by_extension() {
        let url = Url::parse("https://files.example/a/b/movie.MKV").unwrap();
        assert!(DirectExtractor.validate_url(&url));
        let url = Url::parse("https://files.example/watch?v=movie.mp4").unwrap();
        assert!(!DirectExtractor.validate_url(&url));
    }

    #[tokio::test]
    async fn test_head_request_confirms_media() {
        let harness = Harness::new("direct");
        harness.transport.push(
            "https://files.example/",
            Scripted::Respond(
                FetchResponse::new(200, "", "https://files.example/v/show.720p.mp4")
                    .with_header("content-type", "video/mp4")
                    .with_header("content-length", "1048576")
                    .with_header("content-disposition", "attachment; filename=\"Show S01E01 720p.mp4\""),
            ),
        );

        let link = harness.extract("https://files.example/v/show.720p.mp4").await.unwrap();
        assert_eq!(link.filename, "Show S01E01 720p.mp4");
        assert_eq!(link.size_bytes, Some(1048576));
        assert!(link.expiry.is_none());
        assert_eq!(harness.transport.requests()[0].request.method.as_str(), "HEAD");
    }

    #[tokio::test]
    async fn test_signed_looking_url_has_no_expiry() {
        let harness = Harness::new("direct");
        let expire = chrono::Utc::now().timestamp() + 600;
        let url = format!("https://files.example/v/clip.mp4?expires={}", expire);
        harness.transport.push(
            "https://files.example/",
            Scripted::Respond(
                FetchResponse::new(200, "", &url).with_header("content-type", "video/mp4"),
            ),
        );

        let link = harness.extract(&url).await.unwrap();
        assert_eq!(link.direct_link, url);
        assert!(link.expiry.is_none());
    }

    #[tokio::test]
    async fn test_rejects_html_and_missing() {
        let harness = Harness::new("direct");
        harness.transport.push(
            "https://files.example/",
            Scripted::Respond(
                FetchResponse::new(200, "", "https://files.example/x.mp4")
                    .with_header("content-type", "text/html; charset=utf-8"),
            ),
        );
        let err = harness.extract("https://files.example/x.mp4").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExtractionFailed);

        let harness = Harness::new("direct");
        harness.transport.respond("https://files.example/", 404, "");
        let err = harness.extract("https://files.example/y.mp4").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::FileNotFound);
    }
}
