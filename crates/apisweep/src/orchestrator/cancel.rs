//! Cancellation registry and the single-flight slot
//!
//! The registry holds at most one active run. Cancellation is cooperative:
//! `request_cancel` only marks the run, it never aborts the outstanding
//! dispatch. The run leaves the slot when the controller finalizes it.

use super::types::{RunId, RunState};
use tokio_util::sync::CancellationToken;

/// Result of a cancel request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelRequest {
    /// No run is active
    Idle,
    /// The active run was already canceled; the first reason is kept
    AlreadyCanceled,
    /// The active run is now canceled
    Marked { run_id: RunId, in_flight: bool },
}

/// Owner of the active run slot
#[derive(Debug)]
pub struct CancellationRegistry {
    slot: Option<RunState>,
    token: CancellationToken,
}

impl Default for CancellationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self {
            slot: None,
            token: CancellationToken::new(),
        }
    }

    pub fn has_active_run(&self) -> bool {
        self.slot.is_some()
    }

    /// Make `run` the active run and return its cancellation token
    pub fn install(&mut self, run: RunState) -> CancellationToken {
        debug_assert!(self.slot.is_none(), "a run is already active");
        self.token = CancellationToken::new();
        self.slot = Some(run);
        self.token.clone()
    }

    pub fn active(&self) -> Option<&RunState> {
        self.slot.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut RunState> {
        self.slot.as_mut()
    }

    /// Token observed by deferred work belonging to the active run
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Mark the active run canceled
    pub fn request_cancel(&mut self, reason: &str) -> CancelRequest {
        let Some(run) = self.slot.as_mut() else {
            return CancelRequest::Idle;
        };
        if run.core.is_canceled() {
            return CancelRequest::AlreadyCanceled;
        }
        run.core.cancel_reason = Some(reason.to_string());
        self.token.cancel();
        CancelRequest::Marked {
            run_id: run.core.id,
            in_flight: run.core.is_in_flight(),
        }
    }

    /// Remove the active run for finalization
    pub fn take(&mut self) -> Option<RunState> {
        let run = self.slot.take()?;
        self.token.cancel();
        Some(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{DispatchId, DispatchOptions};
    use crate::orchestrator::render::RenderTokenGuard;
    use crate::orchestrator::send::SendPlan;
    use crate::orchestrator::types::{InFlight, RunCore, RunKind};
    use crate::request::RequestSpec;

    fn run() -> RunState {
        let core = RunCore::new(
            RunId::new(),
            RunKind::Send,
            "Send users",
            RequestSpec::new("users", "GET", "http://localhost/users"),
            DispatchOptions::default(),
        );
        RunState {
            core,
            plan: Box::new(SendPlan::new(None)),
        }
    }

    #[test]
    fn test_idle_cancel_is_noop() {
        let mut registry = CancellationRegistry::new();
        assert_eq!(registry.request_cancel("stop"), CancelRequest::Idle);
        assert!(!registry.has_active_run());
    }

    #[test]
    fn test_first_reason_wins() {
        let mut registry = CancellationRegistry::new();
        let token = registry.install(run());

        let first = registry.request_cancel("user");
        assert!(matches!(first, CancelRequest::Marked { in_flight: false, .. }));
        assert!(token.is_cancelled());

        assert_eq!(registry.request_cancel("again"), CancelRequest::AlreadyCanceled);
        let active = registry.active().unwrap();
        assert_eq!(active.core.cancel_reason.as_deref(), Some("user"));
        // Marking does not clear the slot
        assert!(registry.has_active_run());
    }

    #[test]
    fn test_reports_in_flight() {
        let mut registry = CancellationRegistry::new();
        let mut state = run();
        let mut renders = RenderTokenGuard::<()>::new();
        state.core.current = Some(InFlight {
            dispatch_id: DispatchId(1),
            render_token: renders.issue(),
            environment: None,
        });
        registry.install(state);
        assert!(matches!(
            registry.request_cancel("user"),
            CancelRequest::Marked { in_flight: true, .. }
        ));
    }

    #[test]
    fn test_take_clears_slot_and_fires_token() {
        let mut registry = CancellationRegistry::new();
        let token = registry.install(run());
        assert!(registry.take().is_some());
        assert!(token.is_cancelled());
        assert!(!registry.has_active_run());
        assert!(registry.take().is_none());

        // A new run gets a fresh token
        let next = registry.install(run());
        assert!(!next.is_cancelled());
    }
}
