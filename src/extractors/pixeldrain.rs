//! Pixeldrain. Files are served straight from the API with no expiry.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{origin, scrape, segment_after, ExtractContext, PlatformExtractor};
use crate::error::ExtractError;
use crate::http_client::FetchRequest;
use crate::models::MediaLink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixeldrainExtractor;

#[derive(Debug, Deserialize)]
struct FileInfo {
    #[serde(default)]
    success: Option<bool>,
    name: Option<String>,
    size: Option<u64>,
    mime_type: Option<String>,
    thumbnail_href: Option<String>,
}

fn file_id(url: &Url) -> Option<String> {
    segment_after(url, "u").or_else(|| segment_after(url, "file"))
}

#[async_trait]
impl PlatformExtractor for PixeldrainExtractor {
    fn platform_name(&self) -> &'static str {
        "Pixeldrain"
    }

    fn validate_url(&self, url: &Url) -> bool {
        file_id(url).is_some()
    }

    async fn extract(&self, url: &Url, ctx: &ExtractContext<'_>) -> Result<MediaLink, ExtractError> {
        let id = file_id(url).ok_or_else(|| ExtractError::invalid_link("no Pixeldrain file id"))?;
        let api = format!("{}/api/file/{}", origin(url), id);

        let response = ctx
            .fetch(&FetchRequest::get(format!("{}/info", api)).accept_client_errors())
            .await?;
        match response.status {
            404 | 410 => return Err(ExtractError::not_found("Pixeldrain file does not exist")),
            401 | 403 => return Err(ExtractError::access_denied("Pixeldrain refused access")),
            400..=499 => {
                return Err(ExtractError::invalid_link(format!(
                    "Pixeldrain rejected the file id (HTTP {})",
                    response.status
                )))
            }
            _ => {}
        }

        let info: FileInfo = response
            .json()
            .map_err(|e| ExtractError::extraction_failed(format!("Pixeldrain info response: {}", e)))?;
        if info.success == Some(false) {
            return Err(ExtractError::not_found("Pixeldrain file does not exist"));
        }
        if let Some(mime) = info.mime_type.as_deref() {
            if !mime.starts_with("video/") {
                tracing::debug!("Pixeldrain file {} is {}", id, mime);
            }
        }

        let base = Url::parse(&api).map_err(|e| ExtractError::invalid_link(e.to_string()))?;
        let thumbnail = info
            .thumbnail_href
            .and_then(|href| scrape::absolutize(&base, &format!("/api{}", href)));
        let filename = info.name.unwrap_or_else(|| format!("{}.mp4", id));
        let expiry = ctx.expiry_for(&api);

        Ok(MediaLink::new(filename, api)
            .with_size(info.size)
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
    async fn test_info_lookup() {
        let harness = Harness::new("pixeldrain");
        harness.transport.respond(
            "https://pixeldrain.com/api/file/",
            200,
            r#"{"success":true,"name":"concert 1440p.mp4","size":734003200,"mime_type":"video/mp4","thumbnail_href":"/file/Xy12/thumbnail"}"#,
        );

        let link = harness.extract("https://pixeldrain.com/u/Xy12").await.unwrap();
        assert_eq!(link.direct_link, "https://pixeldrain.com/api/file/Xy12");
        assert_eq!(link.quality, "1440p");
        assert_eq!(link.size_bytes, Some(734003200));
        assert_eq!(
            link.thumbnail.as_deref(),
            Some("https://pixeldrain.com/api/file/Xy12/thumbnail")
        );
        assert!(link.expiry.is_none());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let harness = Harness::new("pixeldrain");
        harness.transport.respond(
            "https://pixeldrain.com/api/file/",
            404,
            r#"{"success":false,"value":"not_found"}"#,
        );
        let err = harness.extract("https://pixeldrain.com/u/nope").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::FileNotFound);
    }
}
