//! Scrape target (site) database operations

use anyhow::Result;

use super::Database;

/// A configured scrape target
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct SiteRecord {
    pub id: i64,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
}

impl SiteRecord {
    /// Display name, falling back to the base URL
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.url)
    }
}

/// Sites repository for database operations
pub struct SitesRepository {
    pool: Database,
}

impl SitesRepository {
    pub fn new(pool: Database) -> Self {
        Self { pool }
    }

    /// List sites for the API, newest first
    pub async fn list(&self) -> Result<Vec<SiteRecord>> {
        let sites = sqlx::query_as::<_, SiteRecord>(
            "SELECT id, url, display_name, config FROM sites ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sites)
    }

    /// List sites for a worker run, ascending id
    pub async fn list_for_worker(&self) -> Result<Vec<SiteRecord>> {
        let sites = sqlx::query_as::<_, SiteRecord>(
            "SELECT id, url, display_name, config FROM sites ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sites)
    }

    /// Insert a new site. Returns `None` when the URL already exists.
    pub async fn create(
        &self,
        url: &str,
        display_name: Option<&str>,
        config: Option<&str>,
    ) -> Result<Option<i64>> {
        let result = sqlx::query("INSERT INTO sites(url, display_name, config) VALUES (?1, ?2, ?3)")
            .bind(url)
            .bind(display_name)
            .bind(config)
            .execute(&self.pool)
            .await;

        match result {
            Ok(r) => Ok(Some(r.last_insert_rowid())),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Partial update; absent fields keep their current value.
    pub async fn update(
        &self,
        id: i64,
        url: Option<&str>,
        display_name: Option<&str>,
        config: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sites SET
                url = COALESCE(?1, url),
                display_name = COALESCE(?2, display_name),
                config = COALESCE(?3, config),
                updated_at = datetime('now')
            WHERE id = ?4
            "#,
        )
        .bind(url)
        .bind(display_name)
        .bind(config)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sites WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
