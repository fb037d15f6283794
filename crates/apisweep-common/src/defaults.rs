//! Default configuration values shared across apisweep components
//!
//! These constants keep the CLI, the workspace file loader and the reducers
//! agreeing on the same defaults.

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default number of warmup iterations for a profile run
pub const DEFAULT_WARMUP: u32 = 2;

/// Default number of measured iterations for a profile run
pub const DEFAULT_ITERATIONS: u32 = 20;

/// Default pause between profile iterations in milliseconds
pub const DEFAULT_DELAY_MS: u64 = 0;

/// Number of histogram buckets produced by the profile reducer
pub const DEFAULT_HISTOGRAM_BUCKETS: usize = 10;

/// Percentiles reported by the profile reducer
pub const DEFAULT_PERCENTILES: [u8; 4] = [50, 90, 95, 99];

/// Environment variable naming the workspace file
pub const WORKSPACE_ENV_VAR: &str = "APISWEEP_WORKSPACE";

/// Workspace file name looked up in the current directory
pub const DEFAULT_WORKSPACE_FILE: &str = "apisweep.json";
