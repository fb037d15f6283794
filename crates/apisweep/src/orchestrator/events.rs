//! Loop messages and orchestration events
//!
//! [`LoopMessage`] is everything that can wake the event loop: completions,
//! timer re-entries, formatted responses, cancel requests and history write
//! results. [`RunEvent`] is what `RunController` reports back after handling
//! one; the CLI decides how to present it.

use super::render::{RenderToken, RenderedResponse};
use super::types::RunId;
use crate::execution::Completion;
use crate::request::Verdict;

/// A single discrete input to the event loop
#[derive(Debug, Clone)]
pub enum LoopMessage {
    /// A dispatch finished
    Completion(Completion),
    /// An inter-iteration delay elapsed
    DelayElapsed { run_id: RunId, index: usize },
    /// A response was formatted off-loop
    RenderReady {
        token: RenderToken,
        rendered: RenderedResponse,
    },
    /// The user asked to stop the active run
    Cancel { reason: String },
    /// A history append finished
    HistoryWritten {
        run_id: RunId,
        result: Result<(), String>,
    },
}

/// Event emitted by `RunController`
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// A run became active
    Started { run_id: RunId, label: String },
    /// A start request is waiting for the active run to finalize
    Queued { label: String },
    /// An iteration was handed to the execution service
    Dispatched { run_id: RunId, index: usize },
    /// An iteration outcome was recorded
    IterationRecorded {
        run_id: RunId,
        index: usize,
        verdict: Verdict,
    },
    /// The next dispatch was deferred by the inter-iteration delay
    DelayScheduled { run_id: RunId, index: usize },
    /// The active run was marked canceled
    CancelRequested { run_id: RunId, reason: String },
    /// The run finished and its report is available
    Finalized { run_id: RunId },
    /// The response view was updated
    Rendered,
}
