//! # Sync Cursor Store
//!
//! Persists, per resource, the last page whose records were durably written,
//! so an interrupted memberships sub-pass resumes at the next page.

use crate::{Result, SyncError};
use async_trait::async_trait;
use core_library::models::now_timestamp;
use sqlx::SqlitePool;
use tracing::{debug, warn};

/// Page watermark storage.
#[async_trait]
pub trait SyncCursorStore: Send + Sync {
    /// Last processed page for `key`, or `None` if no cursor exists yet.
    async fn get_cursor(&self, key: &str) -> Result<Option<u32>>;

    /// Record `page` as processed, creating the cursor if absent.
    ///
    /// The stored value never decreases: an older page leaves it unchanged.
    async fn advance_cursor(&self, key: &str, page: u32) -> Result<()>;

    /// Set the cursor to 0, creating it if absent.
    async fn reset_cursor(&self, key: &str) -> Result<()>;
}

/// SQLite implementation of SyncCursorStore
pub struct SqliteSyncCursorStore {
    pool: SqlitePool,
}

impl SqliteSyncCursorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncCursorStore for SqliteSyncCursorStore {
    async fn get_cursor(&self, key: &str) -> Result<Option<u32>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT last_page_processed FROM sync_cursors WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| SyncError::Database(e.to_string()))?;

        row.map(|(page,)| {
            u32::try_from(page).map_err(|_| {
                SyncError::Database(format!("Cursor '{}' holds invalid page {}", key, page))
            })
        })
        .transpose()
    }

    async fn advance_cursor(&self, key: &str, page: u32) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_cursors (key, last_page_processed, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                last_page_processed = excluded.last_page_processed,
                updated_at = excluded.updated_at
            WHERE excluded.last_page_processed >= sync_cursors.last_page_processed
            "#,
        )
        .bind(key)
        .bind(i64::from(page))
        .bind(now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            warn!(key, page, "Ignoring cursor move to an earlier page");
        } else {
            debug!(key, page, "Cursor advanced");
        }

        Ok(())
    }

    async fn reset_cursor(&self, key: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_cursors (key, last_page_processed, updated_at)
            VALUES (?, 0, ?)
            ON CONFLICT(key) DO UPDATE SET
                last_page_processed = 0,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        debug!(key, "Cursor reset");
        Ok(())
    }
}
