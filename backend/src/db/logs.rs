//! Worker run log database operations
//!
//! One entry is written per item per worker run, summarizing the outcome.

use anyhow::Result;
use sqlx::Row;

use super::Database;

/// Page size for the paginated log listing
pub const LOG_PAGE_SIZE: i64 = 25;

/// A per-item run summary
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct LogRecord {
    pub id: i64,
    pub timestamp: String,
    pub description: String,
    pub success: bool,
}

/// One page of log entries plus pagination metadata
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaginatedLogs {
    pub logs: Vec<LogRecord>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// Logs repository for database operations
pub struct LogsRepository {
    pool: Database,
}

impl LogsRepository {
    pub fn new(pool: Database) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, description: &str, success: bool) -> Result<()> {
        sqlx::query("INSERT INTO logs(description, success) VALUES (?1, ?2)")
            .bind(description)
            .bind(success)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Fetch one page of logs, newest first. Pages are 1-based.
    pub async fn page(&self, page: i64) -> Result<PaginatedLogs> {
        let page = page.max(1);
        let offset = (page - 1) * LOG_PAGE_SIZE;

        let total: i64 = sqlx::query("SELECT COUNT(*) AS n FROM logs")
            .fetch_one(&self.pool)
            .await?
            .try_get("n")?;

        let logs = sqlx::query_as::<_, LogRecord>(
            r#"
            SELECT id, timestamp, description, success
            FROM logs
            ORDER BY timestamp DESC, id DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(LOG_PAGE_SIZE)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(PaginatedLogs {
            logs,
            page,
            page_size: LOG_PAGE_SIZE,
            total,
            total_pages: (total + LOG_PAGE_SIZE - 1) / LOG_PAGE_SIZE,
        })
    }

    /// Delete all log entries, returning how many were removed
    pub async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM logs").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM logs")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}
