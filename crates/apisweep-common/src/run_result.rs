//! Per-iteration failure records
//!
//! Used by the profile controller to keep every failed iteration, warmup
//! ones included, so a systematically broken endpoint shows up even before
//! measurement starts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single failed profile iteration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IterationFailure {
    /// Iteration number (0-based, warmup iterations included)
    pub iteration: usize,
    /// Whether the iteration was a warmup iteration
    pub was_warmup: bool,
    /// First applicable failure reason
    pub reason: String,
    /// Status label of the response, if one was received (e.g. "500", "UNAVAILABLE")
    pub status_label: Option<String>,
    /// Measured duration of the failed iteration
    pub duration: Duration,
}

impl IterationFailure {
    /// Create a failure record
    pub fn new(
        iteration: usize,
        was_warmup: bool,
        reason: impl Into<String>,
        status_label: Option<String>,
        duration: Duration,
    ) -> Self {
        Self {
            iteration,
            was_warmup,
            reason: reason.into(),
            status_label,
            duration,
        }
    }
}
