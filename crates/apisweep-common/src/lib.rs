//! apisweep-common - Shared types and utilities
//!
//! This crate holds the dependency-light pieces shared by the orchestration
//! core and its consumers, without any HTTP or database dependencies.
//!
//! ## Modules
//!
//! - [`defaults`]: Default configuration values
//! - [`run_result`]: Per-iteration failure records
//! - [`stats`]: Latency statistics (min/max/mean/median/stddev/percentiles) and histograms
//! - [`status`]: Notification severities and progress cell states

pub mod defaults;
pub mod run_result;
pub mod stats;
pub mod status;

// Re-export commonly used types
pub use run_result::IterationFailure;
pub use stats::{Histogram, HistogramBucket, LatencyStats, Percentile};
pub use status::{CellState, Severity};
