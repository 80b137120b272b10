//! In-memory stores for tests and single-process use.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{select_due, DueCriteria, LinkStore, SettingsStore, StoreError};
use crate::models::{DueReason, LinkRecord};

#[derive(Debug, Default)]
pub struct InMemoryLinkStore {
    rows: RwLock<Vec<LinkRecord>>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed row, replacing any row with the same id.
    pub async fn insert(&self, record: LinkRecord) {
        let mut rows = self.rows.write().await;
        rows.retain(|r| r.id != record.id);
        rows.push(record);
        rows.sort_by_key(|r| r.id);
    }
}

#[async_trait]
impl LinkStore for InMemoryLinkStore {
    async fn add_link(&self, original_url: &str) -> Result<LinkRecord, StoreError> {
        let mut rows = self.rows.write().await;
        if let Some(existing) = rows.iter().find(|r| r.original_url == original_url) {
            return Ok(existing.clone());
        }
        let id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let record = LinkRecord::new(id, original_url);
        rows.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: i32) -> Result<Option<LinkRecord>, StoreError> {
        Ok(self.rows.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<LinkRecord>, StoreError> {
        Ok(self.rows.read().await.clone())
    }

    async fn due_links(
        &self,
        now: DateTime<Utc>,
        criteria: &DueCriteria,
    ) -> Result<Vec<(LinkRecord, DueReason)>, StoreError> {
        let rows = self.rows.read().await.clone();
        Ok(select_due(rows, now, criteria))
    }

    async fn record_success(
        &self,
        id: i32,
        direct_video_url: &str,
        expires_at: Option<DateTime<Utc>>,
        checked_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        row.direct_video_url = Some(direct_video_url.to_string());
        row.video_expires_at = expires_at;
        row.last_checked_at = Some(checked_at);
        row.needs_review = false;
        Ok(())
    }

    async fn record_failure(
        &self,
        id: i32,
        checked_at: DateTime<Utc>,
        needs_review: bool,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        row.last_checked_at = Some(checked_at);
        row.needs_review |= needs_review;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for InMemorySettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
