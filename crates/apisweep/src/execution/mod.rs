//! The single-request execution service
//!
//! The orchestrator never talks to the network itself. It hands a
//! [`Dispatch`] to an [`ExecutionService`], which resolves placeholders
//! against the environment store synchronously and later posts exactly one
//! [`Completion`] back to the event loop.

pub mod assertions;
mod http;

pub use http::HttpExecutor;

use crate::environment::EnvironmentStore;
use crate::request::{ExecutionOutcome, RequestSpec};
use std::fmt;
use std::time::Duration;

/// Correlates a completion with the dispatch that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchId(pub u64);

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// Per-dispatch execution options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    pub timeout: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(apisweep_common::defaults::DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// One request handed to the execution service
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub id: DispatchId,
    /// Fresh clone of the run's base request
    pub request: RequestSpec,
    pub options: DispatchOptions,
}

/// The asynchronous result of a dispatch
#[derive(Debug, Clone)]
pub struct Completion {
    pub dispatch_id: DispatchId,
    pub outcome: ExecutionOutcome,
}

/// Executes single requests on behalf of the orchestrator
pub trait ExecutionService {
    /// Start executing `dispatch`.
    ///
    /// Environment-dependent values must be resolved from `environments`
    /// before this returns; the store's selection may change right after.
    fn dispatch(&self, dispatch: Dispatch, environments: &EnvironmentStore);
}
