//! Shared test utilities for apisweep
//!
//! ## Modules
//!
//! - [`db`]: In-memory SQLite pools
//! - [`http`]: A scripted axum stub server

pub mod db;
pub mod http;

// Re-export commonly used items
pub use db::open_test_db;
pub use http::{StubResponse, StubServer};
