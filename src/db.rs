//! SQLite connection handling.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::DbConfig;

/// Open (creating if missing) the passage database.
///
/// WAL journaling keeps concurrent readers from blocking the ingestion
/// writer.
pub async fn connect(config: &DbConfig) -> Result<SqlitePool> {
    if let Some(parent) = config.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.path.display()))?
        .create_if_missing(true)
        // sqlx enables `PRAGMA foreign_keys` by default; SQLite's own default is
        // off. The code inserts passages before their `documents` ledger row
        // exists (ingest records the document only after the passages land), so
        // restore SQLite's standard default to match the code's ordering.
        .foreign_keys(false)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    tracing::debug!(path = %config.path.display(), "opened passage database");

    Ok(pool)
}
