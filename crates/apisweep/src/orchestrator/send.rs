//! Plain single send

use super::plan::{IterationPlan, cell_state, verdict_cell};
use super::types::{RunCore, RunKind};
use crate::reduce::{RunReport, SendReport};
use crate::request::{IterationOutcome, Verdict};
use apisweep_common::CellState;
use std::time::Instant;

/// One dispatch against the ambient environment
#[derive(Debug)]
pub struct SendPlan {
    environment: Option<String>,
    cells: Vec<CellState>,
}

impl SendPlan {
    pub fn new(environment: Option<String>) -> Self {
        Self {
            environment,
            cells: Vec::new(),
        }
    }
}

impl IterationPlan for SendPlan {
    fn kind(&self) -> RunKind {
        RunKind::Send
    }

    fn plan_length(&self) -> usize {
        1
    }

    fn on_recorded(&mut self, _outcome: &IterationOutcome, verdict: &Verdict, _now: Instant) {
        self.cells.push(verdict_cell(verdict));
    }

    fn progress_cells(&self, run: &RunCore) -> String {
        let env = self.environment.as_deref().unwrap_or("default");
        format!("{env}{}", cell_state(run, &self.cells, 0).symbol())
    }

    fn reduce(&self, run: &RunCore) -> RunReport {
        let outcome = run.results.first();
        RunReport::Send(SendReport {
            environment: self.environment.clone(),
            code: outcome.and_then(IterationOutcome::status_label),
            duration: outcome.filter(|o| !o.canceled).map(|o| o.duration),
            verdict: outcome.map(IterationOutcome::verdict),
        })
    }
}
