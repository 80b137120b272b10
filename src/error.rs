//! Failure taxonomy surfaced to callers.
//!
//! Every failure path in the pipeline ends up as one of the [`ErrorKind`]
//! values below. Components convert their internal errors at their own
//! boundary; the registry guarantees nothing escapes unclassified.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of machine-readable failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidUrl,
    UnsupportedPlatform,
    ConnectionFailed,
    TokenFailed,
    VerificationRequired,
    InvalidLink,
    AccessDenied,
    FileNotFound,
    PageChanged,
    ExtractionFailed,
    Exception,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 11] = [
        Self::InvalidUrl,
        Self::UnsupportedPlatform,
        Self::ConnectionFailed,
        Self::TokenFailed,
        Self::VerificationRequired,
        Self::InvalidLink,
        Self::AccessDenied,
        Self::FileNotFound,
        Self::PageChanged,
        Self::ExtractionFailed,
        Self::Exception,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::UnsupportedPlatform => "unsupported_platform",
            Self::ConnectionFailed => "connection_failed",
            Self::TokenFailed => "token_failed",
            Self::VerificationRequired => "verification_required",
            Self::InvalidLink => "invalid_link",
            Self::AccessDenied => "access_denied",
            Self::FileNotFound => "file_not_found",
            Self::PageChanged => "page_changed",
            Self::ExtractionFailed => "extraction_failed",
            Self::Exception => "exception",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Failures that another attempt on the usual cadence will not fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::InvalidLink
                | Self::FileNotFound
                | Self::AccessDenied
                | Self::InvalidUrl
                | Self::PageChanged
        )
    }

    /// Human-readable remediation advice, distinct from the kind itself.
    pub fn remediation_hint(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "Check that the link is a complete http(s) URL copied from the share page.",
            Self::UnsupportedPlatform => "This host is not supported. Use a link from one of the supported platforms.",
            Self::ConnectionFailed => "The platform could not be reached. Try again in a few minutes.",
            Self::TokenFailed => "The platform credential could not be obtained. Wait a few minutes and retry; an operator may need to refresh the token.",
            Self::VerificationRequired => "The platform is asking for human verification or rate limiting requests. Wait 5-10 minutes before retrying.",
            Self::InvalidLink => "The share link is malformed or no longer valid. Ask the uploader for a new link.",
            Self::AccessDenied => "The file is private or password protected and cannot be accessed.",
            Self::FileNotFound => "The file has been deleted or never existed on the platform.",
            Self::PageChanged => "The platform changed its page structure. Extraction needs an update before this link can be resolved.",
            Self::ExtractionFailed => "No playable video could be located on the page. Retry later or report the link.",
            Self::Exception => "An unexpected internal error occurred. Retry later; the failure has been logged.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified extraction failure.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}: {message}")]
pub struct ExtractError {
    pub kind: ErrorKind,
    pub message: String,
    /// Platform-provided hint about when a retry may succeed.
    pub retry_hint: Option<String>,
    pub platform: Option<String>,
}

impl ExtractError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_hint: None,
            platform: None,
        }
    }

    pub fn with_retry_hint(mut self, hint: impl Into<String>) -> Self {
        self.retry_hint = Some(hint.into());
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidUrl, message)
    }

    pub fn invalid_link(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidLink, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FileNotFound, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AccessDenied, message)
    }

    pub fn extraction_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExtractionFailed, message)
    }

    pub fn exception(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Exception, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::from_str("timeout"), None);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::VerificationRequired).unwrap();
        assert_eq!(json, "\"verification_required\"");
    }

    #[test]
    fn test_permanent_kinds() {
        assert!(ErrorKind::FileNotFound.is_permanent());
        assert!(ErrorKind::PageChanged.is_permanent());
        assert!(!ErrorKind::ConnectionFailed.is_permanent());
        assert!(!ErrorKind::VerificationRequired.is_permanent());
    }

    #[test]
    fn test_hint_differs_from_kind() {
        for kind in ErrorKind::ALL {
            assert_ne!(kind.remediation_hint(), kind.as_str());
        }
        assert!(ErrorKind::VerificationRequired
            .remediation_hint()
            .contains("5-10 minutes"));
    }
}
