//! Baseline-relative diffing for comparison sweeps

use crate::request::{Exchange, IterationOutcome};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

/// Coarse row status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum RowStatus {
    Ok,
    Failed,
    Error,
    Canceled,
}

/// One reduced comparison row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonRow {
    pub environment: String,
    pub status: RowStatus,
    /// Status label of the response, if any
    pub code: Option<String>,
    pub duration: Option<Duration>,
    pub summary: String,
    pub is_baseline: bool,
}

/// Reduced comparison sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonReport {
    pub rows: Vec<ComparisonRow>,
    pub baseline_index: Option<usize>,
    /// A baseline was configured but no row matched it
    pub baseline_fallback: bool,
    /// Number of planned environments
    pub planned: usize,
}

impl ComparisonReport {
    /// Any non-baseline row failed or errored
    pub fn has_failures(&self) -> bool {
        self.rows
            .iter()
            .any(|row| !row.is_baseline && matches!(row.status, RowStatus::Failed | RowStatus::Error))
    }

    pub fn failed_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| matches!(row.status, RowStatus::Failed | RowStatus::Error))
            .count()
    }

    pub fn baseline_environment(&self) -> Option<&str> {
        self.baseline_index
            .and_then(|i| self.rows.get(i))
            .map(|row| row.environment.as_str())
    }
}

/// Pick the baseline row
///
/// Case-insensitive match on the configured name, else the first outcome.
/// Returns the index and whether a configured name failed to match.
pub fn baseline_index(outcomes: &[IterationOutcome], configured: Option<&str>) -> (Option<usize>, bool) {
    if outcomes.is_empty() {
        return (None, false);
    }
    let Some(name) = configured else {
        return (Some(0), false);
    };
    let found = outcomes.iter().position(|o| {
        o.environment
            .as_deref()
            .is_some_and(|env| env.eq_ignore_ascii_case(name))
    });
    match found {
        Some(index) => (Some(index), false),
        None => {
            warn!(baseline = %name, "Configured baseline matched no recorded environment, using the first row");
            (Some(0), true)
        }
    }
}

/// Reduce recorded outcomes into comparison rows
pub fn reduce(outcomes: &[IterationOutcome], baseline: Option<&str>, planned: usize) -> ComparisonReport {
    let (baseline_index, baseline_fallback) = baseline_index(outcomes, baseline);
    let reference = baseline_index
        .and_then(|i| outcomes.get(i))
        .and_then(|o| o.exchange.as_ref());

    let rows = outcomes
        .iter()
        .enumerate()
        .map(|(i, outcome)| {
            let is_baseline = Some(i) == baseline_index;
            ComparisonRow {
                environment: outcome.environment.clone().unwrap_or_default(),
                status: row_status(outcome),
                code: outcome.status_label(),
                duration: (!outcome.canceled).then_some(outcome.duration),
                summary: summarize(outcome, is_baseline, reference),
                is_baseline,
            }
        })
        .collect();

    ComparisonReport {
        rows,
        baseline_index,
        baseline_fallback,
        planned,
    }
}

fn row_status(outcome: &IterationOutcome) -> RowStatus {
    if outcome.canceled {
        return RowStatus::Canceled;
    }
    match &outcome.exchange {
        Some(Exchange::Failed { .. }) | None => RowStatus::Error,
        Some(exchange) => {
            if outcome.script_error.is_some() || exchange.is_error_status() || outcome.failed_tests() > 0 {
                RowStatus::Failed
            } else {
                RowStatus::Ok
            }
        }
    }
}

fn summarize(outcome: &IterationOutcome, is_baseline: bool, reference: Option<&Exchange>) -> String {
    if is_baseline {
        return "baseline".to_string();
    }
    if outcome.canceled {
        return "canceled".to_string();
    }
    let Some(exchange) = &outcome.exchange else {
        return "canceled".to_string();
    };
    if let Exchange::Failed { message, .. } = exchange {
        return format!("error: {message}");
    }
    if let Some(error) = &outcome.script_error {
        return format!("tests error: {error}");
    }
    let failed = outcome.failed_tests();
    if failed > 0 {
        return format!("{failed} test(s) failed");
    }
    let Some(reference) = reference.filter(|r| !matches!(r, Exchange::Failed { .. })) else {
        return "baseline unavailable".to_string();
    };
    let facets = diff_facets(reference, exchange);
    if facets.is_empty() {
        "match".to_string()
    } else {
        format!("{} differ", facets.join(", "))
    }
}

/// Facets in which `other` differs from `baseline`
pub fn diff_facets(baseline: &Exchange, other: &Exchange) -> Vec<&'static str> {
    let mut facets = Vec::new();
    match (baseline, other) {
        (Exchange::Http(a), Exchange::Http(b)) => {
            if a.status != b.status {
                facets.push("status");
            }
            if a.body != b.body {
                facets.push("body");
            }
            if header_multiset(&a.headers) != header_multiset(&b.headers) {
                facets.push("headers");
            }
        }
        (Exchange::Grpc(a), Exchange::Grpc(b)) => {
            if a.code != b.code {
                facets.push("status");
            }
            if a.message != b.message {
                facets.push("message");
            }
            if a.body != b.body {
                facets.push("body");
            }
        }
        _ => facets.push("protocol"),
    }
    facets
}

fn header_multiset(headers: &[(String, String)]) -> BTreeMap<String, Vec<&str>> {
    let mut map: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.to_ascii_lowercase()).or_default().push(value);
    }
    for values in map.values_mut() {
        values.sort_unstable();
    }
    map
}
