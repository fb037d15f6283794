//! Manual test doubles for driving `RunController` without a runtime
//!
//! Each double records what the controller asked of it behind an
//! `Rc<RefCell<..>>`, so a test keeps a clone and inspects it after handing
//! the other clone to [`Services`]. Nothing here spawns tasks: tests feed
//! completions and timer messages back by hand.

use crate::environment::{EnvironmentStore, ResolvedRequest};
use crate::execution::{Completion, Dispatch, DispatchId, ExecutionService};
use crate::history::{HistorySink, SummaryRecord};
use crate::orchestrator::render::format_outcome;
use crate::orchestrator::{
    LoopMessage, LoopRuntime, RenderJob, RunController, RunEvent, Services, StatusNotifier,
};
use crate::request::{Exchange, ExecutionOutcome, GrpcResponse, HttpResponse, TestResult};
use apisweep_common::Severity;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A dispatch as the execution service saw it
#[derive(Debug, Clone)]
pub struct RecordedDispatch {
    pub dispatch: Dispatch,
    /// Ambient environment selection during the dispatch call
    pub environment: Option<String>,
    pub resolved: ResolvedRequest,
}

/// Execution service that only records dispatches
#[derive(Debug, Clone, Default)]
pub struct ManualExecutor {
    dispatches: Rc<RefCell<Vec<RecordedDispatch>>>,
}

impl ManualExecutor {
    pub fn dispatches(&self) -> Vec<RecordedDispatch> {
        self.dispatches.borrow().clone()
    }

    pub fn count(&self) -> usize {
        self.dispatches.borrow().len()
    }

    pub fn last_id(&self) -> Option<DispatchId> {
        self.dispatches.borrow().last().map(|d| d.dispatch.id)
    }
}

impl ExecutionService for ManualExecutor {
    fn dispatch(&self, dispatch: Dispatch, environments: &EnvironmentStore) {
        let resolved = environments.resolve_request(&dispatch.request);
        self.dispatches.borrow_mut().push(RecordedDispatch {
            dispatch,
            environment: environments.active_name().map(str::to_string),
            resolved,
        });
    }
}

/// A timer request
#[derive(Debug, Clone)]
pub struct ScheduledMessage {
    pub delay: Duration,
    pub message: LoopMessage,
    pub cancel: CancellationToken,
}

/// Runtime that records timer and render requests
#[derive(Debug, Clone, Default)]
pub struct ManualRuntime {
    scheduled: Rc<RefCell<Vec<ScheduledMessage>>>,
    renders: Rc<RefCell<Vec<RenderJob>>>,
}

impl ManualRuntime {
    pub fn take_scheduled(&self) -> Vec<ScheduledMessage> {
        std::mem::take(&mut *self.scheduled.borrow_mut())
    }

    pub fn take_renders(&self) -> Vec<RenderJob> {
        std::mem::take(&mut *self.renders.borrow_mut())
    }
}

impl LoopRuntime for ManualRuntime {
    fn schedule(&self, delay: Duration, message: LoopMessage, cancel: CancellationToken) {
        self.scheduled.borrow_mut().push(ScheduledMessage {
            delay,
            message,
            cancel,
        });
    }

    fn spawn_render(&self, job: RenderJob) {
        self.renders.borrow_mut().push(job);
    }
}

/// History sink that keeps records in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    records: Rc<RefCell<Vec<SummaryRecord>>>,
}

impl MemoryHistory {
    pub fn records(&self) -> Vec<SummaryRecord> {
        self.records.borrow().clone()
    }
}

impl HistorySink for MemoryHistory {
    fn append(&self, record: SummaryRecord) {
        self.records.borrow_mut().push(record);
    }
}

/// Notifier that keeps every message
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Rc<RefCell<Vec<(Severity, String)>>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(Severity, String)> {
        self.messages.borrow().clone()
    }

    pub fn last(&self) -> Option<(Severity, String)> {
        self.messages.borrow().last().cloned()
    }
}

impl StatusNotifier for RecordingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        self.messages.borrow_mut().push((severity, message.to_string()));
    }
}

/// A controller wired to manual doubles
pub struct Harness {
    pub controller: RunController,
    pub executor: ManualExecutor,
    pub runtime: ManualRuntime,
    pub history: MemoryHistory,
    pub notifier: RecordingNotifier,
}

impl Harness {
    pub fn new(environments: EnvironmentStore) -> Self {
        let executor = ManualExecutor::default();
        let runtime = ManualRuntime::default();
        let history = MemoryHistory::default();
        let notifier = RecordingNotifier::default();
        let services = Services {
            executor: Box::new(executor.clone()),
            runtime: Box::new(runtime.clone()),
            history: Box::new(history.clone()),
            notifier: Box::new(notifier.clone()),
        };
        Self {
            controller: RunController::new(services, environments),
            executor,
            runtime,
            history,
            notifier,
        }
    }

    /// Complete the most recent dispatch with `outcome`
    pub fn complete_last(&mut self, outcome: ExecutionOutcome) -> Vec<RunEvent> {
        match self.executor.last_id() {
            Some(dispatch_id) => self.complete(dispatch_id, outcome),
            None => Vec::new(),
        }
    }

    pub fn complete(
        &mut self,
        dispatch_id: DispatchId,
        outcome: ExecutionOutcome,
    ) -> Vec<RunEvent> {
        self.controller.handle(LoopMessage::Completion(Completion {
            dispatch_id,
            outcome,
        }))
    }

    /// Deliver every pending timer message whose token was not canceled
    pub fn fire_timers(&mut self) -> Vec<RunEvent> {
        let mut events = Vec::new();
        for scheduled in self.runtime.take_scheduled() {
            if !scheduled.cancel.is_cancelled() {
                events.extend(self.controller.handle(scheduled.message));
            }
        }
        events
    }

    /// Format and deliver every pending render job, in order
    pub fn deliver_renders(&mut self) -> Vec<RunEvent> {
        let mut events = Vec::new();
        for job in self.runtime.take_renders() {
            let rendered = format_outcome(&job.outcome);
            events.extend(self.controller.handle(LoopMessage::RenderReady {
                token: job.token,
                rendered,
            }));
        }
        events
    }
}

/// An HTTP outcome with the given status and body
pub fn http_outcome(status: u16, body: &str, millis: u64) -> ExecutionOutcome {
    ExecutionOutcome {
        exchange: Exchange::Http(HttpResponse {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.as_bytes().to_vec(),
        }),
        test_results: Vec::new(),
        script_error: None,
        duration: Duration::from_millis(millis),
        request_text: String::new(),
    }
}

/// A gRPC outcome
pub fn grpc_outcome(code: i32, code_name: &str, body: &str, millis: u64) -> ExecutionOutcome {
    ExecutionOutcome {
        exchange: Exchange::Grpc(GrpcResponse {
            code,
            code_name: code_name.to_string(),
            message: String::new(),
            body: body.to_string(),
        }),
        ..http_outcome(200, "", millis)
    }
}

/// A transport failure
pub fn transport_failure(message: &str) -> ExecutionOutcome {
    ExecutionOutcome {
        exchange: Exchange::Failed {
            message: message.to_string(),
            canceled: false,
        },
        ..http_outcome(200, "", 1)
    }
}

/// An HTTP 200 outcome with failing assertions
pub fn failed_tests_outcome(failed: usize) -> ExecutionOutcome {
    ExecutionOutcome {
        test_results: (0..failed)
            .map(|i| TestResult::fail(format!("check {i}"), "false"))
            .collect(),
        ..http_outcome(200, "{}", 5)
    }
}
