//! Environment comparison sweep

use super::plan::{IterationPlan, cell_state, verdict_cell};
use super::types::{RunCore, RunKind};
use crate::reduce::{RunReport, compare};
use crate::request::{IterationOutcome, Verdict};
use apisweep_common::CellState;
use std::time::Instant;

/// Replays one request against each environment in order
#[derive(Debug)]
pub struct ComparisonPlan {
    environments: Vec<String>,
    baseline: Option<String>,
    original_environment: Option<Option<String>>,
    cells: Vec<CellState>,
}

impl ComparisonPlan {
    /// `environments` must already be distinct, see [`distinct_environments`]
    pub fn new(
        environments: Vec<String>,
        baseline: Option<String>,
        original_environment: Option<String>,
    ) -> Self {
        Self {
            environments,
            baseline,
            original_environment: Some(original_environment),
            cells: Vec::new(),
        }
    }

    pub fn environments(&self) -> &[String] {
        &self.environments
    }

    /// Position of the row that will be the baseline
    fn baseline_position(&self) -> usize {
        self.baseline
            .as_deref()
            .and_then(|name| {
                self.environments
                    .iter()
                    .position(|env| env.eq_ignore_ascii_case(name))
            })
            .unwrap_or(0)
    }
}

/// Drop repeated environment names, keeping first occurrences in order
pub fn distinct_environments(environments: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(environments.len());
    for env in environments {
        if !seen.contains(env) {
            seen.push(env.clone());
        }
    }
    seen
}

impl IterationPlan for ComparisonPlan {
    fn kind(&self) -> RunKind {
        RunKind::Compare
    }

    fn plan_length(&self) -> usize {
        self.environments.len()
    }

    fn environment_for(&self, index: usize) -> Option<&str> {
        self.environments.get(index).map(String::as_str)
    }

    fn on_recorded(&mut self, _outcome: &IterationOutcome, verdict: &Verdict, _now: Instant) {
        self.cells.push(verdict_cell(verdict));
    }

    fn progress_cells(&self, run: &RunCore) -> String {
        let baseline = self.baseline_position();
        self.environments
            .iter()
            .enumerate()
            .map(|(i, env)| {
                let marker = if i == baseline { "*" } else { "" };
                let state = cell_state(run, &self.cells, i);
                format!("{env}{marker}{}", state.symbol())
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn restore_environment(&mut self) -> Option<Option<String>> {
        self.original_environment.take()
    }

    fn reduce(&self, run: &RunCore) -> RunReport {
        RunReport::Comparison(compare::reduce(
            &run.results,
            self.baseline.as_deref(),
            self.environments.len(),
        ))
    }
}
