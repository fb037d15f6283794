//! Fire-and-forget history writes

use super::crud;
use super::db::DbPool;
use super::types::SummaryRecord;
use crate::orchestrator::LoopMessage;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// Receives one summary per finalized run
pub trait HistorySink {
    /// Start persisting `record`; never blocks the caller
    fn append(&self, record: SummaryRecord);
}

/// Discards every record
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHistory;

impl HistorySink for NullHistory {
    fn append(&self, record: SummaryRecord) {
        debug!(run_id = %record.run_id, "History disabled, summary not stored");
    }
}

/// Writes summaries to SQLite on tracked tasks
///
/// Each write reports back as a `HistoryWritten` message. Failed writes are
/// not retried.
pub struct SqliteHistory {
    pool: DbPool,
    tracker: TaskTracker,
    tx: mpsc::Sender<LoopMessage>,
}

impl SqliteHistory {
    pub fn new(pool: DbPool, tracker: TaskTracker, tx: mpsc::Sender<LoopMessage>) -> Self {
        Self { pool, tracker, tx }
    }
}

impl HistorySink for SqliteHistory {
    fn append(&self, record: SummaryRecord) {
        let pool = self.pool.clone();
        let tx = self.tx.clone();
        self.tracker.spawn(async move {
            let run_id = record.run_id;
            let result = crud::insert_run(&pool, &record)
                .await
                .map_err(|e| format!("{e:#}"));
            let _ = tx.send(LoopMessage::HistoryWritten { run_id, result }).await;
        });
    }
}
