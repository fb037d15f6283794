//! SQLite run history
//!
//! Every finalized run appends one condensed summary. Uses sqlx for async
//! database access with a connection pool.

mod cli;
mod crud;
mod db;
mod queries;
mod sink;
mod types;

// Re-export types
pub use db::{DbPool, open_db};
pub use types::{SummaryRecord, condensed_rows};

// Re-export CRUD and query operations
pub use crud::{delete_runs_older_than, insert_run};
pub use queries::recent_runs;

// Re-export CLI operations
pub use cli::{list_runs, prune_runs};

pub use sink::{HistorySink, NullHistory, SqliteHistory};
