//! Result reducers and the final run report
//!
//! Reducers are pure: the same recorded outcomes always produce the same
//! report.

pub mod compare;
pub mod profile;

pub use compare::{ComparisonReport, ComparisonRow, RowStatus};
pub use profile::{ProfileInput, ProfileReport};

use crate::orchestrator::{RunId, RunKind};
use crate::request::Verdict;
use apisweep_common::Severity;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome of a plain single send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub environment: Option<String>,
    pub code: Option<String>,
    pub duration: Option<Duration>,
    /// `None` when the run was canceled before recording anything
    pub verdict: Option<Verdict>,
}

impl SendReport {
    pub fn has_failures(&self) -> bool {
        matches!(self.verdict, Some(Verdict::Failure { .. }))
    }
}

/// Kind-specific part of a final report
#[derive(Debug, Clone, PartialEq)]
pub enum RunReport {
    Send(SendReport),
    Comparison(ComparisonReport),
    Profile(ProfileReport),
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        match self {
            Self::Send(report) => report.has_failures(),
            Self::Comparison(report) => report.has_failures(),
            Self::Profile(report) => report.has_failures(),
        }
    }
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
    Canceled,
}

/// Everything known about a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct FinalReport {
    pub run_id: RunId,
    pub kind: RunKind,
    pub label: String,
    pub request_name: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub cancel_reason: Option<String>,
    /// Planned iteration count
    pub planned: usize,
    /// Recorded iteration count
    pub recorded: usize,
    pub report: RunReport,
}

impl FinalReport {
    pub fn status(&self) -> RunStatus {
        if self.cancel_reason.is_some() {
            RunStatus::Canceled
        } else if self.report.has_failures() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        }
    }

    /// Severity of the finalize notification
    pub fn severity(&self) -> Severity {
        match self.status() {
            RunStatus::Completed => Severity::Success,
            RunStatus::Failed | RunStatus::Canceled => Severity::Warn,
        }
    }

    /// One-line summary for the finalize notification
    pub fn headline(&self) -> String {
        let mut line = match &self.report {
            RunReport::Send(report) => match &report.verdict {
                Some(Verdict::Success) => format!(
                    "{}: {}",
                    self.label,
                    report.code.as_deref().unwrap_or("ok")
                ),
                Some(verdict) => format!(
                    "{}: {}",
                    self.label,
                    verdict.reason().unwrap_or("failed")
                ),
                None => format!("{}: no response", self.label),
            },
            RunReport::Comparison(report) => {
                let mut line = format!(
                    "{}: {}/{} environments, {} failed",
                    self.label,
                    report.rows.len(),
                    report.planned,
                    report.failed_rows()
                );
                if report.baseline_fallback {
                    line.push_str(" (baseline not found, using first row)");
                }
                line
            }
            RunReport::Profile(report) => {
                let mut line = format!(
                    "{}: {}/{} measured, {} ok, {} failed",
                    self.label,
                    report.completed_measured,
                    report.measured,
                    report.successes,
                    report.failures.len()
                );
                match report.stats.as_ref().and_then(|s| s.percentile(50)) {
                    Some(p50) => line.push_str(&format!(", p50 {:.1} ms", p50.as_secs_f64() * 1000.0)),
                    None => line.push_str(". No successful measurements"),
                }
                line
            }
        };
        if let Some(reason) = &self.cancel_reason {
            line.push_str(&format!(" (canceled: {reason})"));
        }
        line
    }
}
