//! HTTP request handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::{ErrorKind, ExtractError};
use crate::models::{ExtractOptions, ExtractionResult, PlatformDescriptor};

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Query parameters for extraction.
#[derive(Debug, Deserialize)]
pub struct ExtractParams {
    pub url: Option<String>,
    #[serde(default)]
    pub refresh: bool,
    #[serde(default)]
    pub skip_cache: bool,
}

/// Extract a direct link and answer with the result envelope.
///
/// Extraction failures are part of the envelope and still answer 200; only a
/// missing or malformed `url` is a client error.
pub async fn api_extract(
    State(state): State<AppState>,
    Query(params): Query<ExtractParams>,
) -> impl IntoResponse {
    let result = match params.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => {
            let options = ExtractOptions {
                force_refresh: params.refresh,
                skip_cache: params.skip_cache,
            };
            state.registry.extract_url(url, options).await
        }
        None => ExtractionResult::failure(ExtractError::invalid_url("missing 'url' parameter"))
            .with_remediation(),
    };

    let status = match result.error_kind() {
        Some(ErrorKind::InvalidUrl) => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    };
    (status, Json(result.to_envelope()))
}

/// Public view of a platform descriptor.
#[derive(Debug, Serialize)]
pub struct PlatformInfo {
    pub id: String,
    pub name: String,
    pub domains: Vec<String>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub default_link_lifetime: u64,
    pub requires_credential: bool,
}

impl From<&PlatformDescriptor> for PlatformInfo {
    fn from(d: &PlatformDescriptor) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            domains: d.domain_list(),
            enabled: d.enabled,
            icon: d.icon.clone(),
            default_link_lifetime: d.default_link_lifetime,
            requires_credential: d.requires_credential,
        }
    }
}

/// List every configured platform in dispatch order.
pub async fn api_platforms(State(state): State<AppState>) -> impl IntoResponse {
    let platforms: Vec<PlatformInfo> = state.registry.platforms().map(PlatformInfo::from).collect();
    Json(platforms)
}
