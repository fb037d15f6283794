//! Event loop wiring
//!
//! Builds the production services around a [`RunController`], starts one
//! run and pumps loop messages into the controller until everything has
//! settled.

use crate::config::RunConfig;
use crate::environment::EnvironmentStore;
use crate::execution::HttpExecutor;
use crate::history::{HistorySink, NullHistory, SqliteHistory, open_db};
use crate::orchestrator::results::print_response;
use crate::orchestrator::{
    LogNotifier, LoopMessage, RunController, RunEvent, Services, StartRequest, TokioRuntime,
};
use crate::reduce::FinalReport;
use anyhow::{Result, bail};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 100;

/// Run `start` to completion and return its report
///
/// Ctrl-C cancels the active run; the run still finalizes and its partial
/// report is returned.
pub async fn run(
    config: &RunConfig,
    environments: EnvironmentStore,
    start: StartRequest,
) -> Result<Option<FinalReport>> {
    let (tx, mut rx) = mpsc::channel::<LoopMessage>(CHANNEL_CAPACITY);
    let tracker = TaskTracker::new();

    let history: Box<dyn HistorySink> = if config.no_history() {
        Box::new(NullHistory)
    } else {
        match open_db().await {
            Ok(pool) => Box::new(SqliteHistory::new(pool, tracker.clone(), tx.clone())),
            Err(e) => {
                warn!(error = %e, "History unavailable, run summaries will not be stored");
                Box::new(NullHistory)
            }
        }
    };

    let services = Services {
        executor: Box::new(HttpExecutor::new(&config.http, tx.clone())?),
        runtime: Box::new(TokioRuntime::new(tx.clone())),
        history,
        notifier: Box::new(LogNotifier),
    };
    let mut controller = RunController::new(services, environments);

    let interrupt = {
        let tx = tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, canceling run");
                let _ = tx
                    .send(LoopMessage::Cancel {
                        reason: "interrupted by user".to_string(),
                    })
                    .await;
            }
        })
    };

    let show_responses = matches!(start, StartRequest::Send(_)) && !config.quiet();
    if let Err(e) = controller.start(start) {
        interrupt.abort();
        bail!(e);
    }

    let mut last_label = None;
    while !controller.is_settled() {
        let Some(message) = rx.recv().await else {
            warn!("Event loop channel closed with work outstanding");
            break;
        };
        let events = controller.handle(message);

        if show_responses && events.iter().any(|e| matches!(e, RunEvent::Rendered)) {
            if let Some(response) = controller.response_view() {
                print_response(response);
            }
        }

        let label = controller.current_progress_label();
        if label != last_label {
            if let (Some(text), false) = (&label, config.quiet()) {
                println!("{text}");
            }
            last_label = label;
        }
    }
    interrupt.abort();

    // Wait for outstanding history writes and surface their failures
    tracker.close();
    tracker.wait().await;
    while let Ok(message) = rx.try_recv() {
        if matches!(message, LoopMessage::HistoryWritten { .. }) {
            controller.handle(message);
        } else {
            debug!("Dropping message received after the run settled");
        }
    }

    Ok(controller.latest_report().cloned())
}
