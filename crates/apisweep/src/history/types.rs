//! History record types

use crate::orchestrator::{RunId, RunKind};
use crate::reduce::{FinalReport, RunReport, RunStatus};
use chrono::{DateTime, Utc};
use serde_json::json;

/// Condensed summary of one finished run
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub run_id: RunId,
    pub kind: RunKind,
    pub label: String,
    pub request_name: String,
    pub created_at: DateTime<Utc>,
    pub status: RunStatus,
    pub total_duration_ms: i64,
    pub planned: i64,
    pub recorded: i64,
    pub failures: i64,
    pub baseline: Option<String>,
    /// Condensed per-row results
    pub rows: serde_json::Value,
}

impl SummaryRecord {
    pub fn from_report(report: &FinalReport) -> Self {
        let (failures, baseline) = match &report.report {
            RunReport::Send(send) => (i64::from(send.has_failures()), None),
            RunReport::Comparison(compare) => (
                compare.failed_rows() as i64,
                compare.baseline_environment().map(str::to_string),
            ),
            RunReport::Profile(profile) => (profile.failures.len() as i64, None),
        };
        Self {
            run_id: report.run_id,
            kind: report.kind,
            label: report.label.clone(),
            request_name: report.request_name.clone(),
            created_at: report.started_at,
            status: report.status(),
            total_duration_ms: report.elapsed.as_millis() as i64,
            planned: report.planned as i64,
            recorded: report.recorded as i64,
            failures,
            baseline,
            rows: condensed_rows(&report.report),
        }
    }
}

fn millis(duration: Option<std::time::Duration>) -> Option<f64> {
    duration.map(|d| d.as_secs_f64() * 1000.0)
}

/// Compact JSON view of a report's rows
pub fn condensed_rows(report: &RunReport) -> serde_json::Value {
    match report {
        RunReport::Send(send) => json!([{
            "environment": send.environment,
            "code": send.code,
            "duration_ms": millis(send.duration),
            "reason": send.verdict.as_ref().and_then(|v| v.reason()),
        }]),
        RunReport::Comparison(compare) => compare
            .rows
            .iter()
            .map(|row| {
                json!({
                    "environment": row.environment,
                    "status": row.status.as_ref(),
                    "code": row.code,
                    "duration_ms": millis(row.duration),
                    "summary": row.summary,
                })
            })
            .collect(),
        RunReport::Profile(profile) => json!({
            "successes": profile.successes,
            "failures": profile.failures.len(),
            "p50_ms": millis(profile.stats.as_ref().and_then(|s| s.percentile(50))),
            "p99_ms": millis(profile.stats.as_ref().and_then(|s| s.percentile(99))),
            "wall_throughput": profile.wall_throughput,
        }),
    }
}
