//! Schema creation for the SQLite stores.

use diesel_async::RunQueryDsl;
use tracing::debug;

use super::pool::{DbError, SqlitePool};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS links (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        original_url TEXT NOT NULL UNIQUE,
        direct_video_url TEXT,
        video_expires_at TEXT,
        last_checked_at TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        needs_review INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_links_due ON links (is_active, needs_review, video_expires_at)",
    "CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
];

/// Create the tables if they do not exist yet. Safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
    let mut conn = pool.get().await?;
    for statement in SCHEMA {
        diesel::sql_query(*statement).execute(&mut conn).await?;
    }
    debug!("Schema ready at {}", pool.database_url());
    Ok(())
}
