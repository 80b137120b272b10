//! Diesel-based settings store.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::diesel_models::SettingRow;
use super::pool::SqlitePool;
use super::{format_datetime, SettingsStore, StoreError};
use crate::schema::settings;

#[derive(Clone)]
pub struct DieselSettingsStore {
    pool: SqlitePool,
}

impl DieselSettingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for DieselSettingsStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.pool.get().await?;
        let value = settings::table
            .find(key)
            .select(settings::value)
            .first::<String>(&mut conn)
            .await
            .optional()?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        diesel::replace_into(settings::table)
            .values(SettingRow {
                key: key.to_string(),
                value: value.to_string(),
                updated_at: format_datetime(Utc::now()),
            })
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}
