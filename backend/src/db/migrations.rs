//! Startup schema migrations
//!
//! An ordered list of idempotent statements applied inside a single
//! transaction. Request paths never issue DDL.

use anyhow::{Context, Result};

use super::Database;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sites (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL UNIQUE,
        display_name TEXT,
        config TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS matches (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
        matched_text TEXT,
        matched_url TEXT NOT NULL,
        source_site TEXT NOT NULL,
        torrent_text TEXT,
        magnet_link TEXT,
        entities TEXT,
        file_size TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS ux_matches_dedupe
    ON matches(item_id, matched_url, source_site)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL DEFAULT (datetime('now')),
        description TEXT NOT NULL,
        success INTEGER NOT NULL
    )
    "#,
];

/// Apply all migrations under one transaction.
pub async fn run(pool: &Database) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to begin migration transaction")?;

    for (i, stmt) in MIGRATIONS.iter().enumerate() {
        sqlx::query(stmt)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Migration statement {} failed", i))?;
    }

    tx.commit().await.context("Failed to commit migrations")?;
    tracing::debug!(statements = MIGRATIONS.len(), "Schema migrations applied");
    Ok(())
}
