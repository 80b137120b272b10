//! Diesel-based link store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use diesel::sql_types::{BigInt, Text};

use super::diesel_models::{LinkRow, NewLinkRow};
use super::pool::SqlitePool;
use super::{format_datetime, DueCriteria, LinkStore, StoreError};
use crate::models::{DueReason, LinkRecord};
use crate::schema::links;

/// Due rows, most urgent first. Timestamps are stored in a fixed-width UTC
/// form so text comparison orders them chronologically.
///
/// Binds: retry cutoff, lookahead end, stale cutoff, retry cutoff, now,
/// retry cutoff, lookahead end, limit.
const DUE_LINKS_SQL: &str = r#"
SELECT id, original_url, direct_video_url, video_expires_at, last_checked_at,
       is_active, needs_review, created_at
FROM links
WHERE is_active = 1 AND needs_review = 0
  AND (
    ((last_checked_at IS NULL OR last_checked_at <= ?)
      AND (direct_video_url IS NULL OR video_expires_at <= ?))
    OR last_checked_at IS NULL
    OR last_checked_at <= ?
  )
ORDER BY
  CASE
    WHEN (last_checked_at IS NULL OR last_checked_at <= ?)
      AND (direct_video_url IS NULL OR video_expires_at <= ?) THEN 0
    WHEN (last_checked_at IS NULL OR last_checked_at <= ?)
      AND video_expires_at <= ? THEN 1
    ELSE 2
  END,
  video_expires_at IS NULL,
  video_expires_at,
  id
LIMIT ?"#;

#[derive(Clone)]
pub struct DieselLinkStore {
    pool: SqlitePool,
}

impl DieselLinkStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_by_url(&self, original_url: &str) -> Result<Option<LinkRecord>, StoreError> {
        let mut conn = self.pool.get().await?;
        let row = links::table
            .filter(links::original_url.eq(original_url))
            .select(LinkRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(LinkRecord::try_from).transpose()?)
    }
}

#[async_trait]
impl LinkStore for DieselLinkStore {
    async fn add_link(&self, original_url: &str) -> Result<LinkRecord, StoreError> {
        if let Some(existing) = self.find_by_url(original_url).await? {
            return Ok(existing);
        }

        {
            let mut conn = self.pool.get().await?;
            diesel::insert_into(links::table)
                .values(NewLinkRow {
                    original_url,
                    is_active: 1,
                    needs_review: 0,
                    created_at: format_datetime(Utc::now()),
                })
                .execute(&mut conn)
                .await?;
        }

        self.find_by_url(original_url)
            .await?
            .ok_or(StoreError::Database(diesel::result::Error::NotFound))
    }

    async fn get(&self, id: i32) -> Result<Option<LinkRecord>, StoreError> {
        let mut conn = self.pool.get().await?;
        let row = links::table
            .find(id)
            .select(LinkRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(LinkRecord::try_from).transpose()?)
    }

    async fn list(&self) -> Result<Vec<LinkRecord>, StoreError> {
        let mut conn = self.pool.get().await?;
        let rows = links::table
            .order(links::id.asc())
            .select(LinkRow::as_select())
            .load(&mut conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(LinkRecord::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn due_links(
        &self,
        now: DateTime<Utc>,
        criteria: &DueCriteria,
    ) -> Result<Vec<(LinkRecord, DueReason)>, StoreError> {
        let retry_cutoff = format_datetime(now - criteria.retry_after);
        let lookahead_end = format_datetime(now + criteria.lookahead);
        let stale_cutoff = format_datetime(now - criteria.stale_after);

        let mut conn = self.pool.get().await?;
        let rows: Vec<LinkRow> = diesel::sql_query(DUE_LINKS_SQL)
            .bind::<Text, _>(retry_cutoff.clone())
            .bind::<Text, _>(lookahead_end.clone())
            .bind::<Text, _>(stale_cutoff)
            .bind::<Text, _>(retry_cutoff.clone())
            .bind::<Text, _>(format_datetime(now))
            .bind::<Text, _>(retry_cutoff)
            .bind::<Text, _>(lookahead_end)
            .bind::<BigInt, _>(criteria.batch_size as i64)
            .load(&mut conn)
            .await?;

        let mut due = Vec::with_capacity(rows.len());
        for row in rows {
            let record = LinkRecord::try_from(row)?;
            if let Some(reason) = criteria.classify(&record, now) {
                due.push((record, reason));
            }
        }
        Ok(due)
    }

    async fn record_success(
        &self,
        id: i32,
        direct_video_url: &str,
        expires_at: Option<DateTime<Utc>>,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(links::table.find(id))
            .set((
                links::direct_video_url.eq(Some(direct_video_url)),
                links::video_expires_at.eq(expires_at.map(format_datetime)),
                links::last_checked_at.eq(Some(format_datetime(checked_at))),
                links::needs_review.eq(0),
            ))
            .execute(&mut conn)
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        id: i32,
        checked_at: DateTime<Utc>,
        needs_review: bool,
    ) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let updated = if needs_review {
            diesel::update(links::table.find(id))
                .set((
                    links::last_checked_at.eq(Some(format_datetime(checked_at))),
                    links::needs_review.eq(1),
                ))
                .execute(&mut conn)
                .await?
        } else {
            diesel::update(links::table.find(id))
                .set(links::last_checked_at.eq(Some(format_datetime(checked_at))))
                .execute(&mut conn)
                .await?
        };
        if updated == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::run_migrations;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn store() -> (TempDir, DieselLinkStore) {
        let dir = TempDir::new().unwrap();
        let pool = SqlitePool::from_path(&dir.path().join("links.db"));
        run_migrations(&pool).await.unwrap();
        (dir, DieselLinkStore::new(pool))
    }

    #[tokio::test]
    async fn test_add_link_is_idempotent() {
        let (_dir, store) = store().await;
        let first = store.add_link("https://host.example/s/1abc").await.unwrap();
        let second = store.add_link("https://host.example/s/1abc").await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.is_active);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_success_then_not_due() {
        let (_dir, store) = store().await;
        let link = store.add_link("https://host.example/s/1abc").await.unwrap();
        let now = Utc::now();

        let due = store.due_links(now, &DueCriteria::default()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].1, DueReason::Expired);

        store
            .record_success(
                link.id,
                "https://cdn.example/v.mp4?expire=1",
                Some(now + Duration::hours(4)),
                now,
            )
            .await
            .unwrap();

        let stored = store.get(link.id).await.unwrap().unwrap();
        assert_eq!(stored.direct_video_url.as_deref(), Some("https://cdn.example/v.mp4?expire=1"));
        assert!(store.due_links(now, &DueCriteria::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_failure_flags_review() {
        let (_dir, store) = store().await;
        let link = store.add_link("https://host.example/s/1gone").await.unwrap();
        store.record_failure(link.id, Utc::now(), true).await.unwrap();

        let stored = store.get(link.id).await.unwrap().unwrap();
        assert!(stored.needs_review);
        assert!(stored.last_checked_at.is_some());
        assert!(store
            .due_links(Utc::now(), &DueCriteria::default())
            .await
            .unwrap()
            .is_empty());
    }

    /// Add a link numbered `n`, optionally extracted with an expiry
    /// `expires_in` minutes out, checked `checked_ago` minutes ago.
    async fn seed(
        store: &DieselLinkStore,
        n: i32,
        expires_in: Option<i64>,
        checked_ago: Option<i64>,
    ) -> LinkRecord {
        let now = Utc::now();
        let link = store
            .add_link(&format!("https://host.example/s/{}", n))
            .await
            .unwrap();
        match (expires_in, checked_ago) {
            (Some(mins), Some(ago)) => store
                .record_success(
                    link.id,
                    "https://cdn.example/v.mp4",
                    Some(now + Duration::minutes(mins)),
                    now - Duration::minutes(ago),
                )
                .await
                .unwrap(),
            (None, Some(ago)) => store
                .record_failure(link.id, now - Duration::minutes(ago), false)
                .await
                .unwrap(),
            _ => {}
        }
        link
    }

    fn numbers(due: &[(LinkRecord, DueReason)]) -> Vec<String> {
        due.iter()
            .map(|(r, _)| r.original_url.rsplit('/').next().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_due_links_orders_and_limits_in_query() {
        let (_dir, store) = store().await;
        seed(&store, 1, Some(120), Some(60)).await; // stale
        seed(&store, 2, Some(5), Some(6)).await; // expiring soon
        seed(&store, 3, Some(-30), Some(6)).await; // expired
        seed(&store, 4, Some(-60), Some(6)).await; // expired earlier
        seed(&store, 5, Some(120), Some(6)).await; // fresh
        seed(&store, 6, Some(2), Some(6)).await; // expiring sooner
        seed(&store, 7, Some(-90), Some(1)).await; // expired, checked too recently
        seed(&store, 8, None, None).await; // never extracted
        seed(&store, 9, None, Some(1)).await; // first extraction just failed

        let now = Utc::now();
        let due = store.due_links(now, &DueCriteria::default()).await.unwrap();
        assert_eq!(numbers(&due), vec!["4", "3", "8", "6", "2", "1"]);
        let reasons: Vec<DueReason> = due.iter().map(|(_, r)| *r).collect();
        assert_eq!(
            reasons,
            vec![
                DueReason::Expired,
                DueReason::Expired,
                DueReason::Expired,
                DueReason::ExpiringSoon,
                DueReason::ExpiringSoon,
                DueReason::Stale,
            ]
        );

        let criteria = DueCriteria {
            batch_size: 3,
            ..Default::default()
        };
        let due = store.due_links(now, &criteria).await.unwrap();
        assert_eq!(numbers(&due), vec!["4", "3", "8"]);
    }

    #[tokio::test]
    async fn test_failed_row_due_again_after_backoff() {
        let (_dir, store) = store().await;
        seed(&store, 1, None, Some(0)).await;
        let now = Utc::now();
        let criteria = DueCriteria::default();

        assert!(store.due_links(now, &criteria).await.unwrap().is_empty());

        let later = now + criteria.retry_after + Duration::seconds(1);
        let due = store.due_links(later, &criteria).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].1, DueReason::Expired);
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let (_dir, store) = store().await;
        let err = store.record_failure(99, Utc::now(), false).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(99)));
    }
}
