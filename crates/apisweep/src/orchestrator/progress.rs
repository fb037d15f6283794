//! Status notifications
//!
//! Runs emit a notification at start, at every iteration boundary and at
//! finalize. `LogNotifier` routes them to `tracing`.

use apisweep_common::Severity;
use tracing::{info, warn};

/// Receives user-facing status messages
pub trait StatusNotifier {
    fn notify(&self, severity: Severity, message: &str);
}

/// Notifier that logs through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl StatusNotifier for LogNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Warn => warn!(severity = %severity, "{message}"),
            Severity::Info | Severity::Success => info!(severity = %severity, "{message}"),
        }
    }
}
