//! Watchlist item database operations

use anyhow::Result;
use sqlx::Row;

use super::Database;

/// A watchlist item
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ItemRecord {
    pub id: i64,
    pub text: String,
}

/// Items repository for database operations
pub struct ItemsRepository {
    pool: Database,
}

impl ItemsRepository {
    pub fn new(pool: Database) -> Self {
        Self { pool }
    }

    /// List items for the API, newest first
    pub async fn list(&self) -> Result<Vec<ItemRecord>> {
        let items = sqlx::query_as::<_, ItemRecord>(
            "SELECT id, text FROM items ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// List items for a worker run, ascending id
    pub async fn list_for_worker(&self) -> Result<Vec<ItemRecord>> {
        let items =
            sqlx::query_as::<_, ItemRecord>("SELECT id, text FROM items ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(items)
    }

    /// Insert a new item. Returns `None` when the text already exists.
    pub async fn create(&self, text: &str) -> Result<Option<i64>> {
        let result = sqlx::query("INSERT INTO items(text) VALUES (?1)")
            .bind(text)
            .execute(&self.pool)
            .await;

        match result {
            Ok(r) => Ok(Some(r.last_insert_rowid())),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update(&self, id: i64, text: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE items SET text = ?1, updated_at = datetime('now') WHERE id = ?2",
        )
        .bind(text)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an item. Matches cascade via the foreign key.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}
