//! Latency profile: warmup plus measured iterations against one environment

use super::plan::IterationPlan;
use super::types::{RunCore, RunKind};
use crate::reduce::{ProfileInput, RunReport, profile};
use crate::request::{IterationOutcome, Verdict};
use apisweep_common::IterationFailure;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct ProfilePlan {
    warmup: usize,
    measured: usize,
    delay: Duration,
    /// Both counts were zero and one measured iteration was substituted
    fell_back: bool,
    window_start: Option<Instant>,
    window_end: Option<Instant>,
    success_durations: Vec<Duration>,
    failures: Vec<IterationFailure>,
}

impl ProfilePlan {
    pub fn new(warmup: u32, measured: u32, delay: Duration) -> Self {
        let fell_back = warmup == 0 && measured == 0;
        Self {
            warmup: warmup as usize,
            measured: if fell_back { 1 } else { measured as usize },
            delay,
            fell_back,
            window_start: None,
            window_end: None,
            success_durations: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    pub fn success_durations(&self) -> &[Duration] {
        &self.success_durations
    }

    pub fn failures(&self) -> &[IterationFailure] {
        &self.failures
    }

    fn is_warmup(&self, index: usize) -> bool {
        index < self.warmup
    }
}

impl IterationPlan for ProfilePlan {
    fn kind(&self) -> RunKind {
        RunKind::Profile
    }

    fn plan_length(&self) -> usize {
        self.warmup + self.measured
    }

    fn before_dispatch(&mut self, index: usize, now: Instant) {
        if !self.is_warmup(index) && self.window_start.is_none() {
            self.window_start = Some(now);
        }
    }

    fn on_recorded(&mut self, outcome: &IterationOutcome, verdict: &Verdict, now: Instant) {
        let was_warmup = self.is_warmup(outcome.index);
        match verdict {
            Verdict::Success if !was_warmup => {
                self.success_durations.push(outcome.duration);
                self.window_end = Some(now);
            }
            Verdict::Success | Verdict::Canceled => {}
            Verdict::Failure { reason, .. } => self.failures.push(IterationFailure::new(
                outcome.index,
                was_warmup,
                reason.clone(),
                outcome.status_label(),
                outcome.duration,
            )),
        }
    }

    fn delay_after(&self, _index: usize) -> Option<Duration> {
        (!self.delay.is_zero()).then_some(self.delay)
    }

    fn progress_cells(&self, run: &RunCore) -> String {
        let mut cells = if run.index < self.warmup {
            format!("warmup {}/{}", run.index, self.warmup)
        } else {
            let failed = self.failures.iter().filter(|f| !f.was_warmup).count();
            format!(
                "{}/{} ✓{} ✗{}",
                run.index - self.warmup,
                self.measured,
                self.success_durations.len(),
                failed
            )
        };
        if run.is_in_flight() {
            cells.push_str(" …");
        }
        cells
    }

    fn reduce(&self, run: &RunCore) -> RunReport {
        let window = self
            .window_start
            .zip(self.window_end)
            .map(|(start, end)| end.saturating_duration_since(start));
        RunReport::Profile(profile::reduce(ProfileInput {
            warmup: self.warmup,
            measured: self.measured,
            completed_measured: run.results.len().saturating_sub(self.warmup),
            success_durations: &self.success_durations,
            failures: &self.failures,
            window,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::request::{Exchange, ExecutionOutcome, HttpResponse};

    fn outcome(index: usize, status: u16, millis: u64) -> IterationOutcome {
        IterationOutcome::record(
            index,
            None,
            ExecutionOutcome {
                exchange: Exchange::Http(HttpResponse {
                    status,
                    headers: vec![],
                    body: vec![],
                }),
                test_results: vec![],
                script_error: None,
                duration: Duration::from_millis(millis),
                request_text: String::new(),
            },
            false,
        )
    }

    #[test]
    fn test_zero_iterations_fall_back_to_one() {
        let plan = ProfilePlan::new(0, 0, Duration::ZERO);
        assert!(plan.fell_back());
        assert_eq!(plan.plan_length(), 1);
    }

    #[test]
    fn test_warmup_excluded_from_durations() {
        let mut plan = ProfilePlan::new(2, 3, Duration::ZERO);
        let now = Instant::now();
        for (index, status) in [(0, 200), (1, 500), (2, 200), (3, 503), (4, 200)] {
            plan.before_dispatch(index, now);
            let recorded = outcome(index, status, 10 + index as u64);
            let verdict = recorded.verdict();
            plan.on_recorded(&recorded, &verdict, now);
        }
        assert_eq!(
            plan.success_durations(),
            &[Duration::from_millis(12), Duration::from_millis(14)]
        );
        let failures: Vec<_> = plan.failures().iter().map(|f| (f.iteration, f.was_warmup)).collect();
        assert_eq!(failures, vec![(1, true), (3, false)]);
        assert_eq!(plan.failures()[1].status_label.as_deref(), Some("503"));

        // successes + measured failures == measured
        let measured_failures = plan.failures().iter().filter(|f| !f.was_warmup).count();
        assert_eq!(plan.success_durations().len() + measured_failures, 3);
    }

    #[test]
    fn test_window_starts_at_first_measured_dispatch() {
        let mut plan = ProfilePlan::new(1, 1, Duration::ZERO);
        let t0 = Instant::now();
        plan.before_dispatch(0, t0);
        assert!(plan.window_start.is_none());
        plan.before_dispatch(1, t0);
        assert_eq!(plan.window_start, Some(t0));
    }

    #[test]
    fn test_delay_only_when_positive() {
        assert_eq!(ProfilePlan::new(0, 2, Duration::ZERO).delay_after(0), None);
        assert_eq!(
            ProfilePlan::new(0, 2, Duration::from_millis(5)).delay_after(0),
            Some(Duration::from_millis(5))
        );
    }

    #[test]
    fn test_first_reason_recorded() {
        let mut plan = ProfilePlan::new(0, 1, Duration::ZERO);
        let recorded = outcome(0, 500, 1);
        let verdict = Verdict::failure(FailureKind::Status, "status 500");
        plan.on_recorded(&recorded, &verdict, Instant::now());
        assert_eq!(plan.failures()[0].reason, "status 500");
    }
}
