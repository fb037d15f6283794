//! End-to-end orchestration scenarios driven through manual test doubles

use apisweep::environment::{Environment, EnvironmentStore};
use apisweep::error::StartError;
use apisweep::execution::{DispatchId, DispatchOptions};
use apisweep::orchestrator::{
    CompareRequest, LoopMessage, ProfileRequest, RunEvent, RunKind, SendRequest, StartRequest,
};
use apisweep::reduce::{RowStatus, RunReport, RunStatus};
use apisweep::request::{Exchange, RequestSpec};
use apisweep::testing::{
    Harness, failed_tests_outcome, grpc_outcome, http_outcome, transport_failure,
};
use apisweep_common::Severity;
use std::time::Duration;

fn store(active: &str) -> EnvironmentStore {
    EnvironmentStore::new(
        vec![
            Environment::new("dev").with_var("host", "dev.local"),
            Environment::new("stage").with_var("host", "stage.local"),
            Environment::new("prod").with_var("host", "prod.local"),
        ],
        Some(active.to_string()),
    )
}

fn request() -> RequestSpec {
    RequestSpec::new("users", "GET", "http://{{host}}/users")
}

fn compare(environments: &[&str], baseline: Option<&str>) -> StartRequest {
    StartRequest::Compare(CompareRequest {
        label: "Compare users".to_string(),
        request: request(),
        environments: environments.iter().map(|s| s.to_string()).collect(),
        baseline: baseline.map(str::to_string),
        options: DispatchOptions::default(),
    })
}

fn profile(warmup: u32, measured: u32, delay_ms: u64) -> StartRequest {
    StartRequest::Profile(ProfileRequest {
        label: "Profile users".to_string(),
        request: request(),
        warmup,
        measured,
        delay: Duration::from_millis(delay_ms),
        options: DispatchOptions::default(),
    })
}

fn send() -> StartRequest {
    StartRequest::Send(SendRequest {
        label: "Send users".to_string(),
        request: request(),
        options: DispatchOptions::default(),
    })
}

fn has_event(events: &[RunEvent], predicate: impl Fn(&RunEvent) -> bool) -> bool {
    events.iter().any(predicate)
}

#[test]
fn test_comparison_sweep_rows_follow_environment_order() {
    let mut h = Harness::new(store("prod"));
    let events = h.controller.start(compare(&["dev", "stage", "prod"], None)).unwrap();
    assert!(has_event(&events, |e| matches!(e, RunEvent::Started { .. })));
    assert!(has_event(&events, |e| matches!(e, RunEvent::Dispatched { index: 0, .. })));

    let body = r#"{"id":1}"#;
    h.complete_last(http_outcome(200, body, 10));
    h.complete_last(http_outcome(500, body, 12));
    assert_eq!(
        h.controller.current_progress_label().as_deref(),
        Some("Compare users | dev*✓ stage✗ prod…")
    );
    let events = h.complete_last(http_outcome(200, body, 11));
    assert!(has_event(&events, |e| matches!(e, RunEvent::Finalized { .. })));
    assert!(!h.controller.is_active());

    let dispatches = h.executor.dispatches();
    let envs: Vec<_> = dispatches
        .iter()
        .map(|d| d.environment.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(envs, ["dev", "stage", "prod"]);
    assert_eq!(dispatches[1].resolved.url, "http://stage.local/users");

    let report = h.controller.latest_report().unwrap();
    let RunReport::Comparison(comparison) = &report.report else {
        panic!("expected a comparison report");
    };
    let rows: Vec<_> = comparison
        .rows
        .iter()
        .map(|r| (r.environment.as_str(), r.status, r.summary.as_str()))
        .collect();
    assert_eq!(
        rows,
        [
            ("dev", RowStatus::Ok, "baseline"),
            ("stage", RowStatus::Failed, "status differ"),
            ("prod", RowStatus::Ok, "match"),
        ]
    );
    assert_eq!(report.status(), RunStatus::Failed);

    let history = h.history.records();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, RunKind::Compare);
    assert_eq!(h.notifier.last().map(|(s, _)| s), Some(Severity::Warn));
}

#[test]
fn test_comparison_restores_ambient_environment() {
    let mut h = Harness::new(store("prod"));
    h.controller.start(compare(&["dev", "stage"], None)).unwrap();
    // Overrides are scoped to the dispatch call
    assert_eq!(h.controller.environments().active_name(), Some("prod"));

    h.complete_last(http_outcome(200, "{}", 5));
    assert_eq!(h.controller.environments().active_name(), Some("prod"));
    h.complete_last(http_outcome(200, "{}", 5));
    assert!(!h.controller.is_active());
    assert_eq!(h.controller.environments().active_name(), Some("prod"));

    let envs: Vec<_> = h
        .executor
        .dispatches()
        .into_iter()
        .filter_map(|d| d.environment)
        .collect();
    assert_eq!(envs, ["dev", "stage"]);
}

#[test]
fn test_baseline_selection_is_case_insensitive() {
    let mut h = Harness::new(store("dev"));
    h.controller
        .start(compare(&["dev", "stage", "prod"], Some("STAGE")))
        .unwrap();
    assert_eq!(
        h.controller.current_progress_label().as_deref(),
        Some("Compare users | dev… stage*? prod?")
    );
    h.complete_last(http_outcome(200, "a", 5));
    h.complete_last(http_outcome(200, "b", 5));
    h.complete_last(grpc_outcome(0, "OK", "b", 5));

    let report = h.controller.latest_report().unwrap();
    let RunReport::Comparison(comparison) = &report.report else {
        panic!("expected a comparison report");
    };
    assert_eq!(comparison.baseline_environment(), Some("stage"));
    assert!(!comparison.baseline_fallback);
    let summaries: Vec<_> = comparison.rows.iter().map(|r| r.summary.as_str()).collect();
    assert_eq!(summaries, ["body differ", "baseline", "protocol differ"]);
}

#[test]
fn test_unknown_baseline_falls_back_to_first_row() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(compare(&["dev", "prod"], Some("qa"))).unwrap();
    h.complete_last(http_outcome(200, "{}", 5));
    h.complete_last(http_outcome(200, "{}", 5));

    let report = h.controller.latest_report().unwrap();
    let RunReport::Comparison(comparison) = &report.report else {
        panic!("expected a comparison report");
    };
    assert_eq!(comparison.baseline_index, Some(0));
    assert!(comparison.baseline_fallback);
    assert_eq!(comparison.rows[0].summary, "baseline");
}

#[test]
fn test_single_environment_comparison_rejected() {
    let mut h = Harness::new(store("dev"));
    let err = h.controller.start(compare(&["dev", "dev"], None)).unwrap_err();
    assert_eq!(err, StartError::TooFewEnvironments { distinct: 1 });
    assert!(!h.controller.is_active());
    assert_eq!(h.executor.count(), 0);
    assert!(h.history.records().is_empty());
    assert_eq!(h.notifier.last().map(|(s, _)| s), Some(Severity::Warn));
}

#[test]
fn test_cancel_mid_sweep_waits_for_in_flight_dispatch() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(compare(&["dev", "stage", "prod"], None)).unwrap();
    h.complete_last(http_outcome(200, "{}", 5));

    let events = h.controller.request_cancel("stop");
    assert!(has_event(&events, |e| matches!(e, RunEvent::CancelRequested { reason, .. } if reason == "stop")));
    assert!(h.controller.is_active(), "run stays active until the in-flight dispatch returns");

    // Idempotent: the first reason wins and nothing else happens
    assert!(h.controller.request_cancel("again").is_empty());

    let events = h.complete_last(http_outcome(200, "{}", 5));
    assert!(has_event(&events, |e| matches!(e, RunEvent::Finalized { .. })));
    assert!(!h.controller.is_active());
    assert_eq!(h.executor.count(), 2);

    let report = h.controller.latest_report().unwrap();
    assert_eq!(report.cancel_reason.as_deref(), Some("stop"));
    assert_eq!(report.status(), RunStatus::Canceled);
    assert_eq!(report.recorded, 2);
    let RunReport::Comparison(comparison) = &report.report else {
        panic!("expected a comparison report");
    };
    let last = comparison.rows.last().unwrap();
    assert_eq!(last.status, RowStatus::Canceled);
    assert_eq!(last.code, None);
    assert_eq!(comparison.planned, 3);
}

#[test]
fn test_transport_error_racing_cancel_is_recorded_as_canceled() {
    let mut h = Harness::new(store("stage"));
    h.controller.start(compare(&["dev", "prod"], None)).unwrap();
    h.complete_last(http_outcome(200, "{}", 5));

    h.controller.request_cancel("stop");
    // The aborted connection surfaces as a transport error, not a cancellation
    let events = h.complete_last(transport_failure("connection reset"));
    assert!(has_event(&events, |e| matches!(e, RunEvent::Finalized { .. })));
    assert!(!h.controller.is_active());
    assert_eq!(h.controller.environments().active_name(), Some("stage"));

    let report = h.controller.latest_report().unwrap();
    assert_eq!(report.status(), RunStatus::Canceled);
    assert_eq!(report.recorded, 2);
    let RunReport::Comparison(comparison) = &report.report else {
        panic!("expected a comparison report");
    };
    let last = comparison.rows.last().unwrap();
    assert_eq!(last.environment, "prod");
    assert_eq!(last.status, RowStatus::Canceled);
    assert_eq!(last.summary, "canceled");

    let history = h.history.records();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, RunStatus::Canceled);
    assert_eq!(history[0].failures, 0);
}

#[test]
fn test_cancel_without_active_run_is_noop() {
    let mut h = Harness::new(store("dev"));
    assert!(h.controller.request_cancel("nothing").is_empty());
    assert!(h.history.records().is_empty());
}

#[test]
fn test_execution_reported_cancellation_finalizes() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(profile(0, 3, 0)).unwrap();
    let mut outcome = http_outcome(200, "", 5);
    outcome.exchange = Exchange::Failed {
        message: "aborted".to_string(),
        canceled: true,
    };
    h.complete_last(outcome);

    assert!(!h.controller.is_active());
    let report = h.controller.latest_report().unwrap();
    assert_eq!(report.cancel_reason.as_deref(), Some("request canceled"));
    assert_eq!(report.recorded, 1);
}

#[test]
fn test_profile_accounts_for_every_measured_iteration() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(profile(1, 4, 0)).unwrap();
    assert_eq!(
        h.controller.current_progress_label().as_deref(),
        Some("Profile users | warmup 0/1 …")
    );

    h.complete_last(http_outcome(503, "", 5));
    assert_eq!(
        h.controller.current_progress_label().as_deref(),
        Some("Profile users | 0/4 ✓0 ✗0 …")
    );
    h.complete_last(http_outcome(200, "{}", 10));
    h.complete_last(http_outcome(500, "", 20));
    h.complete_last(transport_failure("connection refused"));
    h.complete_last(failed_tests_outcome(0));

    let report = h.controller.latest_report().unwrap();
    let RunReport::Profile(profile) = &report.report else {
        panic!("expected a profile report");
    };
    let successes = profile.stats.as_ref().map_or(0, |s| s.count);
    assert_eq!(successes + profile.measured_failures(), profile.measured);
    assert_eq!(profile.completed_measured, 4);
    assert_eq!(profile.failures.len(), 3);
    assert!(profile.failures[0].was_warmup);
    assert_eq!(profile.failures[0].reason, "status 503");
    assert_eq!(profile.failures[2].reason, "connection refused");
    assert_eq!(h.executor.count(), 5);
}

#[test]
fn test_profile_statistics() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(profile(0, 3, 0)).unwrap();
    for millis in [20, 10, 30] {
        h.complete_last(http_outcome(200, "{}", millis));
    }

    let report = h.controller.latest_report().unwrap();
    let RunReport::Profile(profile) = &report.report else {
        panic!("expected a profile report");
    };
    let stats = profile.stats.as_ref().unwrap();
    assert_eq!(stats.min, Duration::from_millis(10));
    assert_eq!(stats.median, Duration::from_millis(20));
    assert_eq!(stats.max, Duration::from_millis(30));
    assert_eq!(report.status(), RunStatus::Completed);
    assert_eq!(h.notifier.last().map(|(s, _)| s), Some(Severity::Success));
}

#[test]
fn test_profile_zero_iterations_runs_once() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(profile(0, 0, 0)).unwrap();
    assert!(
        h.notifier
            .messages()
            .iter()
            .any(|(s, m)| *s == Severity::Warn && m.contains("1 measured iteration"))
    );
    h.complete_last(http_outcome(200, "{}", 5));
    assert_eq!(h.executor.count(), 1);
    assert_eq!(h.controller.latest_report().unwrap().planned, 1);
}

#[test]
fn test_profile_delay_schedules_next_dispatch() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(profile(0, 2, 50)).unwrap();

    let events = h.complete_last(http_outcome(200, "{}", 5));
    assert!(has_event(&events, |e| matches!(e, RunEvent::DelayScheduled { index: 1, .. })));
    assert_eq!(h.executor.count(), 1, "next dispatch waits for the timer");

    let events = h.fire_timers();
    assert!(has_event(&events, |e| matches!(e, RunEvent::Dispatched { index: 1, .. })));
    h.complete_last(http_outcome(200, "{}", 5));

    // No delay after the last iteration
    assert!(h.runtime.take_scheduled().is_empty());
    assert!(!h.controller.is_active());
}

#[test]
fn test_cancel_during_delay_finalizes_immediately() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(profile(0, 3, 50)).unwrap();
    h.complete_last(http_outcome(200, "{}", 5));

    let events = h.controller.request_cancel("stop");
    assert!(has_event(&events, |e| matches!(e, RunEvent::Finalized { .. })));
    assert!(h.fire_timers().is_empty());
    assert_eq!(h.executor.count(), 1);
}

#[test]
fn test_stale_delay_ignored() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(profile(0, 3, 50)).unwrap();
    let run_id = h.controller.active_run().unwrap().core.id;
    h.complete_last(http_outcome(200, "{}", 5));

    // Wrong index for the current run
    let events = h.controller.handle(LoopMessage::DelayElapsed { run_id, index: 2 });
    assert!(events.is_empty());
    assert_eq!(h.executor.count(), 1);
}

#[test]
fn test_stale_completion_ignored() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(send()).unwrap();

    assert!(h.complete(DispatchId(999), http_outcome(200, "{}", 5)).is_empty());
    assert!(h.controller.is_active());

    let dispatch_id = h.executor.last_id().unwrap();
    h.complete(dispatch_id, http_outcome(200, "{}", 5));
    assert!(!h.controller.is_active());

    // A duplicate after finalize changes nothing
    assert!(h.complete(dispatch_id, http_outcome(500, "", 5)).is_empty());
    assert_eq!(h.history.records().len(), 1);
}

#[test]
fn test_new_start_supersedes_active_run() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(profile(0, 5, 0)).unwrap();

    let events = h.controller.start(compare(&["dev", "prod"], None)).unwrap();
    assert!(has_event(&events, |e| matches!(e, RunEvent::CancelRequested { .. })));
    assert!(has_event(&events, |e| matches!(e, RunEvent::Queued { .. })));
    assert!(h.controller.has_pending_start());
    assert_eq!(h.executor.count(), 1);

    let events = h.complete_last(http_outcome(200, "{}", 5));
    assert!(has_event(&events, |e| matches!(e, RunEvent::Finalized { .. })));
    assert!(has_event(&events, |e| matches!(e, RunEvent::Started { label, .. } if label == "Compare users")));
    assert_eq!(h.controller.active_run().unwrap().core.kind, RunKind::Compare);

    let records = h.history.records();
    assert_eq!(records[0].status, RunStatus::Canceled);
    assert_eq!(
        h.controller.latest_report().unwrap().cancel_reason.as_deref(),
        Some("superseded by Compare users")
    );
}

#[test]
fn test_later_queued_start_replaces_earlier() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(profile(0, 5, 0)).unwrap();
    h.controller.start(compare(&["dev", "prod"], None)).unwrap();
    h.controller.start(send()).unwrap();

    h.complete_last(http_outcome(200, "{}", 5));
    assert_eq!(h.controller.active_run().unwrap().core.kind, RunKind::Send);
    assert!(!h.controller.has_pending_start());
}

#[test]
fn test_user_cancel_drops_queued_start() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(profile(0, 5, 0)).unwrap();
    h.controller.start(send()).unwrap();
    h.controller.request_cancel("stop");
    assert!(!h.controller.has_pending_start());

    h.complete_last(http_outcome(200, "{}", 5));
    assert!(!h.controller.is_active());
    assert_eq!(h.executor.count(), 1);
}

#[test]
fn test_send_render_settles_loop() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(send()).unwrap();
    h.complete_last(http_outcome(200, r#"{"ok":true}"#, 5));
    assert!(!h.controller.is_active());
    assert!(!h.controller.is_settled(), "render still outstanding");

    let events = h.deliver_renders();
    assert_eq!(events, [RunEvent::Rendered]);
    assert!(h.controller.is_settled());
    let view = h.controller.response_view().unwrap();
    assert!(view.title.starts_with("200"));
    assert!(view.body.contains("\"ok\": true"));
}

#[test]
fn test_only_latest_render_is_shown() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(profile(0, 2, 0)).unwrap();
    h.complete_last(http_outcome(200, "first", 5));
    h.complete_last(http_outcome(201, "second", 5));

    let mut jobs = h.runtime.take_renders();
    assert_eq!(jobs.len(), 2);
    let second = jobs.pop().unwrap();
    let first = jobs.pop().unwrap();

    let events = h.controller.handle(LoopMessage::RenderReady {
        token: second.token,
        rendered: apisweep::orchestrator::render::format_outcome(&second.outcome),
    });
    assert_eq!(events, [RunEvent::Rendered]);

    let events = h.controller.handle(LoopMessage::RenderReady {
        token: first.token,
        rendered: apisweep::orchestrator::render::format_outcome(&first.outcome),
    });
    assert!(events.is_empty());
    assert!(h.controller.response_view().unwrap().title.starts_with("201"));
}

#[test]
fn test_comparison_start_clears_previous_comparison_report() {
    let mut h = Harness::new(store("dev"));
    h.controller.start(compare(&["dev", "prod"], None)).unwrap();
    h.complete_last(http_outcome(200, "{}", 5));
    h.complete_last(http_outcome(200, "{}", 5));
    assert!(h.controller.latest_report().is_some());

    h.controller.start(compare(&["dev", "prod"], None)).unwrap();
    assert!(h.controller.latest_report().is_none());
}
