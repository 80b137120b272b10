//! Storage collaborators used by the pipeline.
//!
//! The pipeline does not own these stores. It needs a handful of operations
//! on previously submitted links and a tiny key/value settings table for
//! platform credentials, expressed as the [`LinkStore`] and [`SettingsStore`]
//! traits with in-memory and Diesel/SQLite implementations.

mod diesel_links;
mod diesel_models;
mod diesel_settings;
mod memory;
mod migrations;
mod pool;

pub use diesel_links::DieselLinkStore;
pub use diesel_settings::DieselSettingsStore;
pub use memory::{InMemoryLinkStore, InMemorySettingsStore};
pub use migrations::run_migrations;
pub use pool::{DbError, SqliteConn, SqlitePool};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use thiserror::Error;

use crate::models::{DueReason, LinkRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("link {0} not found")]
    NotFound(i32),
}

/// Selection window for the refresh sweep.
#[derive(Debug, Clone, Copy)]
pub struct DueCriteria {
    /// Links expiring within this window are due.
    pub lookahead: Duration,
    /// Links not checked for this long are due.
    pub stale_after: Duration,
    /// Rows checked more recently than this are not due for expiry reasons.
    pub retry_after: Duration,
    pub batch_size: usize,
}

impl DueCriteria {
    pub fn classify(&self, row: &LinkRecord, now: DateTime<Utc>) -> Option<DueReason> {
        row.due_reason(now, self.lookahead, self.stale_after, self.retry_after)
    }
}

impl Default for DueCriteria {
    fn default() -> Self {
        Self {
            lookahead: Duration::minutes(10),
            stale_after: Duration::minutes(30),
            retry_after: Duration::minutes(5),
            batch_size: 50,
        }
    }
}

/// Persistent link storage.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Register a share link, returning the existing row if already known.
    async fn add_link(&self, original_url: &str) -> Result<LinkRecord, StoreError>;

    async fn get(&self, id: i32) -> Result<Option<LinkRecord>, StoreError>;

    async fn list(&self) -> Result<Vec<LinkRecord>, StoreError>;

    /// Rows due for refresh, most urgent first, at most `batch_size`.
    async fn due_links(
        &self,
        now: DateTime<Utc>,
        criteria: &DueCriteria,
    ) -> Result<Vec<(LinkRecord, DueReason)>, StoreError>;

    /// Store a freshly extracted direct link.
    async fn record_success(
        &self,
        id: i32,
        direct_video_url: &str,
        expires_at: Option<DateTime<Utc>>,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Note a failed refresh, optionally flagging the row for manual review.
    async fn record_failure(
        &self,
        id: i32,
        checked_at: DateTime<Utc>,
        needs_review: bool,
    ) -> Result<(), StoreError>;
}

/// Shared key/value settings.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite a value atomically.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Pick due rows from `rows`: expired first, then expiring soon, then stale,
/// each group by ascending expiry, truncated to the batch size.
pub fn select_due(
    rows: impl IntoIterator<Item = LinkRecord>,
    now: DateTime<Utc>,
    criteria: &DueCriteria,
) -> Vec<(LinkRecord, DueReason)> {
    let mut due: Vec<(LinkRecord, DueReason)> = rows
        .into_iter()
        .filter_map(|row| {
            let reason = criteria.classify(&row, now)?;
            Some((row, reason))
        })
        .collect();

    due.sort_by(|(a, ra), (b, rb)| {
        ra.cmp(rb)
            .then_with(|| match (a.video_expires_at, b.video_expires_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| a.id.cmp(&b.id))
    });
    due.truncate(criteria.batch_size);
    due
}

/// Format a timestamp for storage: RFC 3339, UTC, fixed microsecond width.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 timestamp from the database.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional timestamp from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i32, expires_in_mins: Option<i64>, checked_mins_ago: Option<i64>) -> LinkRecord {
        let now = Utc::now();
        LinkRecord {
            direct_video_url: Some(format!("https://cdn.example/{}.mp4", id)),
            video_expires_at: expires_in_mins.map(|m| now + Duration::minutes(m)),
            last_checked_at: checked_mins_ago.map(|m| now - Duration::minutes(m)),
            ..LinkRecord::new(id, format!("https://host.example/s/{}", id))
        }
    }

    #[test]
    fn test_select_due_orders_by_urgency_then_expiry() {
        let rows = vec![
            row(1, Some(120), Some(60)), // stale
            row(2, Some(5), Some(6)),    // expiring soon
            row(3, Some(-30), Some(6)),  // expired
            row(4, Some(-60), Some(6)),  // expired earlier
            row(5, Some(120), Some(6)),  // fresh
            row(6, Some(2), Some(6)),    // expiring sooner
            row(7, Some(-90), Some(1)),  // expired, checked too recently
        ];
        let due = select_due(rows, Utc::now(), &DueCriteria::default());
        let ids: Vec<i32> = due.iter().map(|(r, _)| r.id).collect();
        assert_eq!(ids, vec![4, 3, 6, 2, 1]);
        assert_eq!(due[0].1, DueReason::Expired);
        assert_eq!(due[4].1, DueReason::Stale);
    }

    #[test]
    fn test_select_due_respects_batch_size() {
        let rows = (1..=10).map(|i| row(i, Some(-i as i64), Some(6)));
        let criteria = DueCriteria {
            batch_size: 3,
            ..Default::default()
        };
        assert_eq!(select_due(rows, Utc::now(), &criteria).len(), 3);
    }

    #[test]
    fn test_parse_datetime_round_trip() {
        let now = Utc::now();
        let parsed = parse_datetime(&now.to_rfc3339());
        assert_eq!(parsed, now);
        assert_eq!(parse_datetime("garbage"), DateTime::UNIX_EPOCH);
        assert!(parse_datetime_opt(None).is_none());
    }

    #[test]
    fn test_stored_timestamps_sort_as_text() {
        let base = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let earlier = format_datetime(base);
        let later = format_datetime(base + Duration::milliseconds(500));
        assert_eq!(earlier, "2026-01-01T00:00:00.000000Z");
        assert!(earlier < later);
        assert_eq!(parse_datetime(&later), base + Duration::milliseconds(500));
    }
}
