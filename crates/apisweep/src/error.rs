//! Typed errors for configuration loading and run rejection
//!
//! Per-iteration failures are not errors at this level: they are recorded
//! as data points and classified with [`FailureKind`].

use thiserror::Error;

/// Workspace file loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the workspace file
    #[error("Failed to read workspace file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse JSON
    #[error("Failed to parse workspace file: {0}")]
    Parse(#[from] serde_json::Error),

    /// A request name was not found in the workspace
    #[error("unknown request '{0}'")]
    UnknownRequest(String),

    /// An environment name was not found in the workspace
    #[error("unknown environment '{0}'")]
    UnknownEnvironment(String),

    /// A request definition has an empty URL
    #[error("request '{0}' has an empty url")]
    EmptyUrl(String),

    /// A request definition has an empty method
    #[error("request '{0}' has an empty method")]
    EmptyMethod(String),
}

impl ConfigError {
    /// Create an IO error with path context
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A run start request rejected before any state change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    /// A comparison sweep needs at least two distinct environments
    #[error("comparison needs at least 2 distinct environments, got {distinct}")]
    TooFewEnvironments { distinct: usize },
}

/// Why a single iteration did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// The exchange itself failed (network/protocol level)
    Transport,
    /// An assertion script raised an error
    Evaluation,
    /// The response status was classified as an error
    Status,
    /// One or more assertions evaluated false
    Assertion,
    /// The iteration was canceled by the user
    Cancellation,
}
