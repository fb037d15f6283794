//! Database setup and schema management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Database connection pool type alias
pub type DbPool = SqlitePool;

/// Get the history database path
fn get_db_path() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("", "", "apisweep").context("Failed to get project directories")?;

    let data_dir = proj_dirs.data_local_dir();
    fs::create_dir_all(data_dir).context("Failed to create data directory")?;

    Ok(data_dir.join("history.db"))
}

/// Open the history database, creating it if needed
pub async fn open_db() -> Result<DbPool> {
    let path = get_db_path()?;
    let db_url = format!("sqlite://{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("Failed to open history database")?;

    setup_schema(&pool).await?;

    Ok(pool)
}

/// Setup database schema
pub(crate) async fn setup_schema(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS runs (
            run_id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            label TEXT NOT NULL,
            request_name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            status TEXT NOT NULL,
            total_duration_ms INTEGER NOT NULL,
            planned INTEGER NOT NULL,
            recorded INTEGER NOT NULL,
            failures INTEGER NOT NULL,
            baseline TEXT,
            rows_json TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create runs table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_created ON runs(created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// In-memory database with the schema applied
#[cfg(test)]
pub(crate) async fn open_test_db() -> Result<DbPool> {
    let pool = apisweep_test_utils::open_test_db().await?;
    setup_schema(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = open_test_db().await.unwrap();
        setup_schema(&pool).await.unwrap();

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='runs'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(tables, 1);
    }
}
