//! Inbound extraction requests.

use serde::{Deserialize, Serialize};

/// Per-call extraction options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Ignore any cached result and extract again. The fresh result is cached.
    #[serde(default, alias = "refresh")]
    pub force_refresh: bool,
    /// Do not read from the cache.
    #[serde(default)]
    pub skip_cache: bool,
}

impl ExtractOptions {
    pub fn refresh() -> Self {
        Self {
            force_refresh: true,
            skip_cache: false,
        }
    }

    /// Whether a cached result may be returned for this call.
    pub fn reads_cache(&self) -> bool {
        !self.force_refresh && !self.skip_cache
    }
}

/// A single extraction call. Created per call and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub url: String,
    pub options: ExtractOptions,
}

impl ExtractionRequest {
    pub fn new(url: impl Into<String>, options: ExtractOptions) -> Self {
        Self {
            url: url.into().trim().to_string(),
            options,
        }
    }
}
