//! Per-kind iteration plans
//!
//! A plan decides how many iterations a run has, what each one dispatches
//! against, how outcomes are accumulated and how the run is reduced. The
//! controller owns everything else.

use super::types::{RunCore, RunKind};
use crate::reduce::RunReport;
use crate::request::{IterationOutcome, Verdict};
use apisweep_common::CellState;
use std::time::{Duration, Instant};

pub trait IterationPlan {
    fn kind(&self) -> RunKind;

    /// Total number of planned iterations
    fn plan_length(&self) -> usize;

    /// Environment to select while dispatching iteration `index`
    fn environment_for(&self, _index: usize) -> Option<&str> {
        None
    }

    /// Called right before iteration `index` is dispatched
    fn before_dispatch(&mut self, _index: usize, _now: Instant) {}

    fn classify(&self, outcome: &IterationOutcome) -> Verdict {
        outcome.verdict()
    }

    /// Called once per recorded outcome, in index order
    fn on_recorded(&mut self, outcome: &IterationOutcome, verdict: &Verdict, now: Instant);

    /// Pause before dispatching the iteration after `index`
    fn delay_after(&self, _index: usize) -> Option<Duration> {
        None
    }

    /// Progress cells for the live label
    fn progress_cells(&self, run: &RunCore) -> String;

    /// Ambient environment selection to restore at finalize; yields it once
    fn restore_environment(&mut self) -> Option<Option<String>> {
        None
    }

    fn reduce(&self, run: &RunCore) -> RunReport;
}

/// Cell state of planned iteration `index`
pub(crate) fn cell_state(run: &RunCore, recorded: &[CellState], index: usize) -> CellState {
    if let Some(state) = recorded.get(index) {
        *state
    } else if index == run.index && run.is_in_flight() {
        CellState::InFlight
    } else {
        CellState::Pending
    }
}

pub(crate) fn verdict_cell(verdict: &Verdict) -> CellState {
    if verdict.is_success() {
        CellState::Succeeded
    } else {
        CellState::Failed
    }
}
