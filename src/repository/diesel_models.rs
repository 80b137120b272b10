//! Diesel row types.

use diesel::prelude::*;

use super::{parse_datetime_opt, DbError};
use crate::models::LinkRecord;
use crate::schema::{links, settings};

#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = links)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LinkRow {
    pub id: i32,
    pub original_url: String,
    pub direct_video_url: Option<String>,
    pub video_expires_at: Option<String>,
    pub last_checked_at: Option<String>,
    pub is_active: i32,
    pub needs_review: i32,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = links)]
pub struct NewLinkRow<'a> {
    pub original_url: &'a str,
    pub is_active: i32,
    pub needs_review: i32,
    pub created_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = settings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SettingRow {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

impl TryFrom<LinkRow> for LinkRecord {
    type Error = DbError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        Ok(LinkRecord {
            id: row.id,
            original_url: row.original_url,
            direct_video_url: row.direct_video_url,
            video_expires_at: parse_datetime_opt(row.video_expires_at),
            last_checked_at: parse_datetime_opt(row.last_checked_at),
            is_active: row.is_active != 0,
            needs_review: row.needs_review != 0,
        })
    }
}
