//! Database test utilities
//!
//! Schema setup is done by the consuming crate, which owns the schema.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Database connection pool type alias
pub type TestDbPool = SqlitePool;

/// Create an empty in-memory SQLite connection pool.
///
/// ```ignore
/// let pool = apisweep_test_utils::open_test_db().await.unwrap();
/// ```
pub async fn open_test_db() -> Result<TestDbPool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1) // Single connection for in-memory to maintain state
        .connect_with(options)
        .await?;

    Ok(pool)
}
