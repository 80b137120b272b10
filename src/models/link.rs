//! Persisted link rows owned by the link storage collaborator.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A previously submitted share link and the last direct link extracted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: i32,
    pub original_url: String,
    pub direct_video_url: Option<String>,
    pub video_expires_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    /// Set when a permanent failure needs a human to look at the link.
    pub needs_review: bool,
}

/// Why a link was picked up by the refresh sweep. Ordered by urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueReason {
    Expired,
    ExpiringSoon,
    Stale,
}

impl DueReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::ExpiringSoon => "expiring_soon",
            Self::Stale => "stale",
        }
    }
}

impl LinkRecord {
    pub fn new(id: i32, original_url: impl Into<String>) -> Self {
        Self {
            id,
            original_url: original_url.into(),
            direct_video_url: None,
            video_expires_at: None,
            last_checked_at: None,
            is_active: true,
            needs_review: false,
        }
    }

    /// Classify this row for the refresh sweep, or `None` when it is fresh.
    ///
    /// Rows that were never extracted count as expired. A row checked within
    /// `retry_after` is not due for expiry reasons, so a failing row waits
    /// before it is tried again. Inactive rows and rows awaiting manual review
    /// are never due.
    pub fn due_reason(
        &self,
        now: DateTime<Utc>,
        lookahead: Duration,
        stale_after: Duration,
        retry_after: Duration,
    ) -> Option<DueReason> {
        if !self.is_active || self.needs_review {
            return None;
        }

        let may_retry = self
            .last_checked_at
            .map_or(true, |checked| checked <= now - retry_after);

        if may_retry {
            if self.direct_video_url.is_none() {
                return Some(DueReason::Expired);
            }
            if let Some(expires_at) = self.video_expires_at {
                if expires_at <= now {
                    return Some(DueReason::Expired);
                }
                if expires_at <= now + lookahead {
                    return Some(DueReason::ExpiringSoon);
                }
            }
        }

        match self.last_checked_at {
            None => Some(DueReason::Stale),
            Some(checked) if checked <= now - stale_after => Some(DueReason::Stale),
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted(expires_in_mins: Option<i64>, checked_mins_ago: i64) -> LinkRecord {
        let now = Utc::now();
        LinkRecord {
            direct_video_url: Some("https://cdn.example/v.mp4".to_string()),
            video_expires_at: expires_in_mins.map(|m| now + Duration::minutes(m)),
            last_checked_at: Some(now - Duration::minutes(checked_mins_ago)),
            ..LinkRecord::new(1, "https://host.example/s/abc")
        }
    }

    fn classify(link: &LinkRecord, now: DateTime<Utc>) -> Option<DueReason> {
        link.due_reason(
            now,
            Duration::minutes(10),
            Duration::minutes(30),
            Duration::minutes(5),
        )
    }

    #[test]
    fn test_due_reason_classification() {
        let now = Utc::now();

        assert_eq!(classify(&extracted(Some(-1), 6), now), Some(DueReason::Expired));
        assert_eq!(classify(&extracted(Some(5), 6), now), Some(DueReason::ExpiringSoon));
        assert_eq!(classify(&extracted(Some(120), 45), now), Some(DueReason::Stale));
        assert_eq!(classify(&extracted(Some(120), 5), now), None);
        assert_eq!(classify(&extracted(None, 5), now), None);
    }

    #[test]
    fn test_never_extracted_is_expired() {
        let link = LinkRecord::new(7, "https://host.example/s/abc");
        assert_eq!(classify(&link, Utc::now()), Some(DueReason::Expired));
    }

    #[test]
    fn test_recently_checked_rows_wait_before_retry() {
        let now = Utc::now();

        // A failed first extraction leaves no direct link but a check time
        let failed = LinkRecord {
            last_checked_at: Some(now - Duration::minutes(1)),
            ..LinkRecord::new(3, "https://host.example/s/abc")
        };
        assert_eq!(classify(&failed, now), None);
        assert_eq!(
            classify(&failed, now + Duration::minutes(5)),
            Some(DueReason::Expired)
        );

        assert_eq!(classify(&extracted(Some(-1), 1), now), None);
        assert_eq!(classify(&extracted(Some(5), 1), now), None);
    }

    #[test]
    fn test_review_and_inactive_rows_are_skipped() {
        let now = Utc::now();
        let mut link = extracted(Some(-5), 60);
        link.needs_review = true;
        assert_eq!(classify(&link, now), None);

        let mut link = extracted(Some(-5), 60);
        link.is_active = false;
        assert_eq!(classify(&link, now), None);
    }
}
