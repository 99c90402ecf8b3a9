//! Persisted match database operations
//!
//! Deduplication is enforced here: the unique index on
//! (item_id, matched_url, source_site) makes the insert an
//! insert-if-not-exists, and the returned flag tells the caller whether
//! the row was first observed by this insert.

use anyhow::Result;
use sqlx::Row;

use super::Database;

/// Input for persisting a confirmed match
#[derive(Debug, Clone)]
pub struct NewMatch<'a> {
    pub item_id: i64,
    pub matched_text: &'a str,
    pub matched_url: &'a str,
    pub source_site: &'a str,
    pub torrent_text: &'a str,
    pub magnet_link: &'a str,
    /// Raw entity JSON as returned by the extractor ("[]" when absent)
    pub entities_json: &'a str,
    /// Denormalized from the FILE_SIZE entity when present
    pub file_size: &'a str,
}

/// A match row joined with its item, shaped for the API
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct MatchRow {
    pub id: i64,
    pub item: String,
    pub url: String,
    pub site: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub torrent_text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub magnet_link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub file_size: String,
    pub created: String,
}

/// Matches repository for database operations
pub struct MatchesRepository {
    pool: Database,
}

impl MatchesRepository {
    pub fn new(pool: Database) -> Self {
        Self { pool }
    }

    /// Insert-if-not-exists keyed by (item_id, matched_url, source_site).
    /// Returns true when the row is new.
    pub async fn insert_dedup(&self, m: NewMatch<'_>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO matches(
                item_id, matched_text, matched_url, source_site,
                torrent_text, magnet_link, entities, file_size
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(item_id, matched_url, source_site) DO NOTHING
            "#,
        )
        .bind(m.item_id)
        .bind(m.matched_text)
        .bind(m.matched_url)
        .bind(m.source_site)
        .bind(m.torrent_text)
        .bind(m.magnet_link)
        .bind(m.entities_json)
        .bind(m.file_size)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Newest matches for the API, capped at 200
    pub async fn list_recent(&self) -> Result<Vec<MatchRow>> {
        let rows = sqlx::query_as::<_, MatchRow>(
            r#"
            SELECT
                m.id,
                i.text AS item,
                m.matched_url AS url,
                m.source_site AS site,
                COALESCE(m.torrent_text, '') AS torrent_text,
                COALESCE(m.magnet_link, '') AS magnet_link,
                COALESCE(m.file_size, '') AS file_size,
                m.created_at AS created
            FROM matches m
            JOIN items i ON i.id = m.item_id
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT 200
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM matches WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of matches persisted for one item
    pub async fn count_for_item(&self, item_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM matches WHERE item_id = ?1")
            .bind(item_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}
