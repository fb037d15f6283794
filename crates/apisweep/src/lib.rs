//! apisweep - run orchestration for an interactive API client
//!
//! This crate drives a single logical "send" into one or many request
//! executions: plain sends, environment comparison sweeps and latency
//! profiles. It tracks their lifecycle, reconciles cancellation with
//! in-flight work, and reduces raw outcomes into reports.

pub mod app;
pub mod config;
pub mod environment;
pub mod error;
pub mod execution;
pub mod history;
pub mod orchestrator;
pub mod reduce;
pub mod request;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
