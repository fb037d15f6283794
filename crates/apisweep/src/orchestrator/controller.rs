//! The run controller
//!
//! `RunController` is the single owner of run state. It is driven one
//! [`LoopMessage`] at a time and never blocks: network work, timers,
//! response formatting and history writes all happen elsewhere and come
//! back as messages. Each handler returns the [`RunEvent`]s it produced.
//!
//! Only one run is active at a time. Starting a run while another is active
//! cancels the old one and queues the new start until the old run has
//! finalized.

use super::cancel::{CancelRequest, CancellationRegistry};
use super::compare::{ComparisonPlan, distinct_environments};
use super::events::{LoopMessage, RunEvent};
use super::plan::IterationPlan;
use super::profile::ProfilePlan;
use super::progress::StatusNotifier;
use super::render::{RenderJob, RenderToken, RenderTokenGuard, RenderedResponse};
use super::runtime::LoopRuntime;
use super::send::SendPlan;
use super::types::{InFlight, RunCore, RunId, RunState};
use crate::environment::EnvironmentStore;
use crate::error::StartError;
use crate::execution::{Completion, Dispatch, DispatchId, DispatchOptions, ExecutionService};
use crate::history::{HistorySink, SummaryRecord};
use crate::reduce::{FinalReport, RunReport};
use crate::request::{IterationOutcome, RequestSpec};
use apisweep_common::Severity;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Collaborators the controller drives
pub struct Services {
    pub executor: Box<dyn ExecutionService>,
    pub runtime: Box<dyn LoopRuntime>,
    pub history: Box<dyn HistorySink>,
    pub notifier: Box<dyn StatusNotifier>,
}

/// Plain single send
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub label: String,
    pub request: RequestSpec,
    pub options: DispatchOptions,
}

/// Replay one request against several environments
#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub label: String,
    pub request: RequestSpec,
    pub environments: Vec<String>,
    pub baseline: Option<String>,
    pub options: DispatchOptions,
}

/// Replay one request `warmup + measured` times
#[derive(Debug, Clone)]
pub struct ProfileRequest {
    pub label: String,
    pub request: RequestSpec,
    pub warmup: u32,
    pub measured: u32,
    pub delay: Duration,
    pub options: DispatchOptions,
}

#[derive(Debug, Clone)]
pub enum StartRequest {
    Send(SendRequest),
    Compare(CompareRequest),
    Profile(ProfileRequest),
}

impl StartRequest {
    pub fn label(&self) -> &str {
        match self {
            Self::Send(r) => &r.label,
            Self::Compare(r) => &r.label,
            Self::Profile(r) => &r.label,
        }
    }
}

pub struct RunController {
    services: Services,
    environments: EnvironmentStore,
    registry: CancellationRegistry,
    renders: RenderTokenGuard<RenderedResponse>,
    next_dispatch: u64,
    pending_start: Option<StartRequest>,
    latest_report: Option<FinalReport>,
}

impl RunController {
    pub fn new(services: Services, environments: EnvironmentStore) -> Self {
        Self {
            services,
            environments,
            registry: CancellationRegistry::new(),
            renders: RenderTokenGuard::new(),
            next_dispatch: 0,
            pending_start: None,
            latest_report: None,
        }
    }

    // ── Read-only accessors ─────────────────────────────────────────────

    /// A run is active (a plain send counts)
    pub fn is_active(&self) -> bool {
        self.registry.has_active_run()
    }

    /// Nothing active, nothing queued and no render outstanding
    pub fn is_settled(&self) -> bool {
        !self.is_active() && self.pending_start.is_none() && !self.renders.is_pending()
    }

    pub fn has_pending_start(&self) -> bool {
        self.pending_start.is_some()
    }

    /// `"<label> | <cells>"` for the active run
    pub fn current_progress_label(&self) -> Option<String> {
        let run = self.registry.active()?;
        Some(format!(
            "{} | {}",
            run.core.label,
            run.plan.progress_cells(&run.core)
        ))
    }

    /// Report of the most recently finalized run
    pub fn latest_report(&self) -> Option<&FinalReport> {
        self.latest_report.as_ref()
    }

    /// The most recently accepted rendered response
    pub fn response_view(&self) -> Option<&RenderedResponse> {
        self.renders.current()
    }

    pub fn environments(&self) -> &EnvironmentStore {
        &self.environments
    }

    pub fn active_run(&self) -> Option<&RunState> {
        self.registry.active()
    }

    // ── Commands ────────────────────────────────────────────────────────

    /// Start a run, superseding the active one if there is one
    ///
    /// A comparison with fewer than two distinct environments is rejected
    /// before anything else happens.
    pub fn start(&mut self, request: StartRequest) -> Result<Vec<RunEvent>, StartError> {
        let request = match request {
            StartRequest::Compare(mut compare) => {
                compare.environments = distinct_environments(&compare.environments);
                let distinct = compare.environments.len();
                if distinct < 2 {
                    let err = StartError::TooFewEnvironments { distinct };
                    warn!(label = %compare.label, distinct, "Comparison rejected");
                    self.services.notifier.notify(Severity::Warn, &err.to_string());
                    return Err(err);
                }
                StartRequest::Compare(compare)
            }
            other => other,
        };

        let mut events = Vec::new();
        if self.registry.has_active_run() {
            let reason = format!("superseded by {}", request.label());
            self.cancel_active(&reason, &mut events);
        }

        if self.registry.has_active_run() {
            info!(label = %request.label(), "Queued start until the active run finalizes");
            if let Some(previous) = self.pending_start.replace(request.clone()) {
                debug!(label = %previous.label(), "Replaced queued start");
            }
            events.push(RunEvent::Queued {
                label: request.label().to_string(),
            });
        } else {
            self.launch(request, &mut events);
        }
        Ok(events)
    }

    /// Cancel the active run and drop any queued start
    pub fn request_cancel(&mut self, reason: &str) -> Vec<RunEvent> {
        let mut events = Vec::new();
        if let Some(dropped) = self.pending_start.take() {
            info!(label = %dropped.label(), "Dropped queued start");
        }
        self.cancel_active(reason, &mut events);
        events
    }

    /// Handle one loop message
    pub fn handle(&mut self, message: LoopMessage) -> Vec<RunEvent> {
        let mut events = Vec::new();
        match message {
            LoopMessage::Completion(completion) => self.on_completion(completion, &mut events),
            LoopMessage::DelayElapsed { run_id, index } => {
                self.on_delay_elapsed(run_id, index, &mut events)
            }
            LoopMessage::RenderReady { token, rendered } => {
                self.on_render_ready(token, rendered, &mut events)
            }
            LoopMessage::Cancel { reason } => events = self.request_cancel(&reason),
            LoopMessage::HistoryWritten { run_id, result } => match result {
                Ok(()) => debug!(run_id = %run_id, "Run summary stored"),
                Err(e) => {
                    warn!(run_id = %run_id, error = %e, "Failed to store run summary");
                    self.services
                        .notifier
                        .notify(Severity::Warn, &format!("history write failed: {e}"));
                }
            },
        }
        events
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn launch(&mut self, request: StartRequest, events: &mut Vec<RunEvent>) {
        let (label, base, options, plan): (String, RequestSpec, DispatchOptions, Box<dyn IterationPlan>) =
            match request {
                StartRequest::Send(r) => {
                    let env = self.environments.active_name().map(str::to_string);
                    (r.label, r.request, r.options, Box::new(SendPlan::new(env)))
                }
                StartRequest::Compare(r) => {
                    if matches!(
                        self.latest_report.as_ref().map(|report| &report.report),
                        Some(RunReport::Comparison(_))
                    ) {
                        self.latest_report = None;
                    }
                    let original = self.environments.active_name().map(str::to_string);
                    let plan = ComparisonPlan::new(r.environments, r.baseline, original);
                    (r.label, r.request, r.options, Box::new(plan))
                }
                StartRequest::Profile(r) => {
                    let plan = ProfilePlan::new(r.warmup, r.measured, r.delay);
                    if plan.fell_back() {
                        warn!(label = %r.label, "Profile requested zero iterations, running one measured iteration");
                        self.services.notifier.notify(
                            Severity::Warn,
                            "warmup and iterations are both 0; running 1 measured iteration",
                        );
                    }
                    (r.label, r.request, r.options, Box::new(plan))
                }
            };

        let run_id = RunId::new();
        let kind = plan.kind();
        let total = plan.plan_length();
        info!(run_id = %run_id, kind = %kind, label = %label, iterations = total, "Starting run");
        self.services
            .notifier
            .notify(Severity::Info, &format!("{label}: starting {total} iteration(s)"));

        let core = RunCore::new(run_id, kind, label.clone(), base, options);
        self.registry.install(RunState { core, plan });
        events.push(RunEvent::Started { run_id, label });

        self.dispatch_iteration(events);
    }

    fn dispatch_iteration(&mut self, events: &mut Vec<RunEvent>) {
        let Some(run) = self.registry.active_mut() else {
            return;
        };
        if run.core.is_canceled() || run.core.is_in_flight() {
            return;
        }
        let index = run.core.index;
        if index >= run.plan.plan_length() {
            self.finalize(events);
            return;
        }

        self.next_dispatch += 1;
        let dispatch_id = DispatchId(self.next_dispatch);
        let render_token = self.renders.issue();

        run.plan.before_dispatch(index, Instant::now());
        let env_override = run.plan.environment_for(index).map(str::to_string);
        let environment = env_override
            .clone()
            .or_else(|| self.environments.active_name().map(str::to_string));

        run.core.awaiting_delay = false;
        run.core.current = Some(InFlight {
            dispatch_id,
            render_token,
            environment,
        });
        let run_id = run.core.id;
        let dispatch = Dispatch {
            id: dispatch_id,
            request: run.core.base.clone(),
            options: run.core.options.clone(),
        };

        debug!(run_id = %run_id, index, dispatch_id = %dispatch_id, "Dispatching iteration");
        match env_override {
            Some(name) => {
                let scoped = self.environments.scoped(&name);
                self.services.executor.dispatch(dispatch, &scoped);
            }
            None => self.services.executor.dispatch(dispatch, &self.environments),
        }
        events.push(RunEvent::Dispatched { run_id, index });
    }

    fn on_completion(&mut self, completion: Completion, events: &mut Vec<RunEvent>) {
        let Some(run) = self.registry.active_mut() else {
            debug!(dispatch_id = %completion.dispatch_id, "Ignoring completion with no active run");
            return;
        };
        let Some(in_flight) = run
            .core
            .current
            .take_if(|f| f.dispatch_id == completion.dispatch_id)
        else {
            debug!(dispatch_id = %completion.dispatch_id, "Ignoring stale completion");
            return;
        };

        let index = run.core.index;
        let outcome = IterationOutcome::record(
            index,
            in_flight.environment,
            completion.outcome,
            run.core.is_canceled(),
        );
        let verdict = run.plan.classify(&outcome);
        run.plan.on_recorded(&outcome, &verdict, Instant::now());

        let run_id = run.core.id;
        let label = run.core.label.clone();
        let total = run.plan.plan_length();
        let job = RenderJob {
            token: in_flight.render_token,
            outcome: outcome.clone(),
        };
        let outcome_canceled = outcome.canceled;
        run.core.results.push(outcome);
        run.core.index += 1;

        let more = run.core.index < total;
        let delay = run
            .plan
            .delay_after(index)
            .filter(|d| more && !d.is_zero() && !outcome_canceled);
        run.core.awaiting_delay = delay.is_some();

        self.services.runtime.spawn_render(job);

        let summary = verdict.reason().unwrap_or("ok");
        self.services.notifier.notify(
            Severity::Info,
            &format!("{label}: iteration {}/{total} {summary}", index + 1),
        );
        events.push(RunEvent::IterationRecorded {
            run_id,
            index,
            verdict: verdict.clone(),
        });

        if outcome_canceled {
            // The execution service may report cancellation on its own
            self.registry.request_cancel("request canceled");
            self.finalize(events);
            return;
        }
        if !more {
            self.finalize(events);
            return;
        }
        match delay {
            Some(delay) => {
                let next = index + 1;
                debug!(run_id = %run_id, next, delay_ms = delay.as_millis() as u64, "Delaying next iteration");
                self.services.runtime.schedule(
                    delay,
                    LoopMessage::DelayElapsed { run_id, index: next },
                    self.registry.token(),
                );
                events.push(RunEvent::DelayScheduled { run_id, index: next });
            }
            None => self.dispatch_iteration(events),
        }
    }

    fn on_delay_elapsed(&mut self, run_id: RunId, index: usize, events: &mut Vec<RunEvent>) {
        let current = self.registry.active().is_some_and(|run| {
            run.core.id == run_id && run.core.index == index && run.core.awaiting_delay
        });
        if !current {
            debug!(run_id = %run_id, index, "Ignoring stale delay");
            return;
        }
        self.dispatch_iteration(events);
    }

    fn on_render_ready(&mut self, token: RenderToken, rendered: RenderedResponse, events: &mut Vec<RunEvent>) {
        if self.renders.accept(token, rendered) {
            events.push(RunEvent::Rendered);
        } else {
            debug!(?token, "Dropping stale render");
        }
    }

    fn cancel_active(&mut self, reason: &str, events: &mut Vec<RunEvent>) {
        match self.registry.request_cancel(reason) {
            CancelRequest::Idle => debug!("Cancel requested with no active run"),
            CancelRequest::AlreadyCanceled => debug!(reason, "Run already canceled"),
            CancelRequest::Marked { run_id, in_flight } => {
                info!(run_id = %run_id, reason, in_flight, "Cancel requested");
                events.push(RunEvent::CancelRequested {
                    run_id,
                    reason: reason.to_string(),
                });
                if !in_flight {
                    self.finalize(events);
                }
            }
        }
    }

    /// Reduce, persist and notify; runs exactly once per run
    fn finalize(&mut self, events: &mut Vec<RunEvent>) {
        let Some(mut run) = self.registry.take() else {
            return;
        };
        debug_assert!(run.core.current.is_none(), "finalized with a dispatch in flight");

        if let Some(original) = run.plan.restore_environment() {
            self.environments.select(original);
        }

        let report = run.plan.reduce(&run.core);
        let summary = FinalReport {
            run_id: run.core.id,
            kind: run.core.kind,
            label: run.core.label.clone(),
            request_name: run.core.base.name.clone(),
            started_at: run.core.started_at,
            elapsed: run.core.started.elapsed(),
            cancel_reason: run.core.cancel_reason.clone(),
            planned: run.plan.plan_length(),
            recorded: run.core.results.len(),
            report,
        };

        info!(
            run_id = %summary.run_id,
            status = %summary.status(),
            recorded = summary.recorded,
            planned = summary.planned,
            "Run finalized"
        );
        self.services.history.append(SummaryRecord::from_report(&summary));
        self.services
            .notifier
            .notify(summary.severity(), &summary.headline());

        events.push(RunEvent::Finalized {
            run_id: summary.run_id,
        });
        self.latest_report = Some(summary);

        if let Some(next) = self.pending_start.take() {
            self.launch(next, events);
        }
    }
}
