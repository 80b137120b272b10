//! Extraction results and the JSON envelope handed to callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ExtractError};
use crate::expiry::ExpiryInfo;
use crate::utils::format_size;

/// Quality tags recognised in filenames, checked in order.
const QUALITY_MARKERS: &[(&str, &str)] = &[
    ("2160p", "2160p"),
    ("4k", "2160p"),
    ("uhd", "2160p"),
    ("1440p", "1440p"),
    ("1080p", "1080p"),
    ("fhd", "1080p"),
    ("720p", "720p"),
    ("hd", "720p"),
    ("480p", "480p"),
    ("360p", "360p"),
    ("240p", "240p"),
];

/// Best-effort quality tag derived from a filename or title.
pub fn quality_from_name(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    QUALITY_MARKERS
        .iter()
        .find(|(marker, _)| lower.contains(marker))
        .map(|(_, quality)| *quality)
        .unwrap_or("Unknown")
}

/// A located, playable media asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaLink {
    pub filename: String,
    pub direct_link: String,
    pub thumbnail: Option<String>,
    pub size_bytes: Option<u64>,
    pub quality: String,
    /// `None` means the link carries no tracked expiry.
    pub expiry: Option<ExpiryInfo>,
    /// The link was accepted without matching a known media pattern.
    #[serde(default)]
    pub low_confidence: bool,
}

impl MediaLink {
    pub fn new(filename: impl Into<String>, direct_link: impl Into<String>) -> Self {
        let filename = filename.into();
        let quality = quality_from_name(&filename).to_string();
        Self {
            filename,
            direct_link: direct_link.into(),
            thumbnail: None,
            size_bytes: None,
            quality,
            expiry: None,
            low_confidence: false,
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<String>) -> Self {
        self.thumbnail = thumbnail.filter(|t| !t.is_empty());
        self
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size_bytes = size.filter(|s| *s > 0);
        self
    }

    pub fn with_expiry(mut self, expiry: Option<ExpiryInfo>) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn low_confidence(mut self) -> Self {
        self.low_confidence = true;
        self
    }

    pub fn has_expiry(&self) -> bool {
        self.expiry.is_some()
    }
}

/// Failure half of an [`ExtractionResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    pub retry_hint: Option<String>,
    /// Remediation advice for humans; never changes `kind`.
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(MediaLink),
    Failure(Failure),
}

/// Output of one extraction attempt, possibly served from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub platform: Option<String>,
    pub outcome: Outcome,
    pub cached: bool,
    pub cached_at: Option<DateTime<Utc>>,
    /// Set on cache hits whose entry is close to expiry.
    pub refresh_hint: bool,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionResult {
    pub fn success(platform: impl Into<String>, link: MediaLink) -> Self {
        Self {
            platform: Some(platform.into()),
            outcome: Outcome::Success(link),
            cached: false,
            cached_at: None,
            refresh_hint: false,
            extracted_at: Utc::now(),
        }
    }

    pub fn failure(error: ExtractError) -> Self {
        Self {
            platform: error.platform,
            outcome: Outcome::Failure(Failure {
                kind: error.kind,
                message: error.message,
                retry_hint: error.retry_hint,
                hint: None,
            }),
            cached: false,
            cached_at: None,
            refresh_hint: false,
            extracted_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    pub fn link(&self) -> Option<&MediaLink> {
        match &self.outcome {
            Outcome::Success(link) => Some(link),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&Failure> {
        match &self.outcome {
            Outcome::Failure(failure) => Some(failure),
            Outcome::Success(_) => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error().map(|f| f.kind)
    }

    /// Attach the remediation hint for the failure kind, if this is a failure.
    pub fn with_remediation(mut self) -> Self {
        if let Outcome::Failure(failure) = &mut self.outcome {
            failure.hint = Some(failure.kind.remediation_hint().to_string());
        }
        self
    }

    pub fn to_envelope(&self) -> Envelope {
        self.to_envelope_at(Utc::now())
    }

    /// Render the caller-facing envelope with `expires_in` relative to `now`.
    pub fn to_envelope_at(&self, now: DateTime<Utc>) -> Envelope {
        match &self.outcome {
            Outcome::Success(link) => Envelope {
                success: true,
                platform: self.platform.clone(),
                data: Some(EnvelopeData::from_link(link, now)),
                error: None,
                message: None,
                hint: None,
                retry_hint: None,
                cached: self.cached,
                refresh_recommended: self.refresh_hint,
                extracted_at: Some(self.extracted_at.to_rfc3339()),
                timestamp: None,
            },
            Outcome::Failure(failure) => Envelope {
                success: false,
                platform: self.platform.clone(),
                data: None,
                error: Some(failure.kind),
                message: Some(failure.message.clone()),
                hint: failure.hint.clone(),
                retry_hint: failure.retry_hint.clone(),
                cached: self.cached,
                refresh_recommended: false,
                extracted_at: None,
                timestamp: Some(self.extracted_at.to_rfc3339()),
            },
        }
    }
}

/// Caller-facing JSON shape of an extraction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<EnvelopeData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_hint: Option<String>,
    pub cached: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub refresh_recommended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeData {
    pub filename: String,
    pub direct_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    pub expires_in: Option<i64>,
    /// Unix timestamp in seconds.
    pub expires_at: Option<i64>,
    pub expires_at_formatted: Option<String>,
    pub has_expiry: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub low_confidence: bool,
}

impl EnvelopeData {
    fn from_link(link: &MediaLink, now: DateTime<Utc>) -> Self {
        Self {
            filename: link.filename.clone(),
            direct_link: link.direct_link.clone(),
            thumbnail: link.thumbnail.clone(),
            size: link.size_bytes,
            size_formatted: link.size_bytes.map(format_size),
            quality: Some(link.quality.clone()).filter(|q| !q.is_empty()),
            expires_in: link.expiry.map(|e| e.remaining_at(now)),
            expires_at: link.expiry.map(|e| e.expires_at.timestamp()),
            expires_at_formatted: link.expiry.as_ref().map(ExpiryInfo::formatted),
            has_expiry: link.has_expiry(),
            low_confidence: link.low_confidence,
        }
    }
}
