//! Deferred work on behalf of the event loop
//!
//! The controller never sleeps or formats responses itself. It asks a
//! [`LoopRuntime`] to do that work elsewhere and post the result back as a
//! single [`LoopMessage`].

use super::events::LoopMessage;
use super::render::{self, RenderJob, RenderedResponse};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub trait LoopRuntime {
    /// Post `message` after `delay` unless `cancel` fires first
    fn schedule(&self, delay: Duration, message: LoopMessage, cancel: CancellationToken);

    /// Format a response off-loop and post a `RenderReady` message
    fn spawn_render(&self, job: RenderJob);
}

/// Runtime backed by tokio tasks
pub struct TokioRuntime {
    tx: mpsc::Sender<LoopMessage>,
}

impl TokioRuntime {
    pub fn new(tx: mpsc::Sender<LoopMessage>) -> Self {
        Self { tx }
    }
}

impl LoopRuntime for TokioRuntime {
    fn schedule(&self, delay: Duration, message: LoopMessage, cancel: CancellationToken) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Delayed message dropped after cancellation");
                }
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(message).await;
                }
            }
        });
    }

    fn spawn_render(&self, job: RenderJob) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let token = job.token;
            let rendered =
                match tokio::task::spawn_blocking(move || render::format_outcome(&job.outcome)).await {
                    Ok(rendered) => rendered,
                    Err(e) => {
                        warn!(error = %e, "Response formatting failed");
                        RenderedResponse {
                            title: format!("render failed: {e}"),
                            headers: Vec::new(),
                            body: String::new(),
                        }
                    }
                };
            let _ = tx.send(LoopMessage::RenderReady { token, rendered }).await;
        });
    }
}
