//! Query operations for the history database

use super::db::DbPool;
use super::types::SummaryRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

/// Most recent runs first
pub async fn recent_runs(pool: &DbPool, limit: u32) -> Result<Vec<SummaryRecord>> {
    let rows = sqlx::query(
        "SELECT run_id, kind, label, request_name, created_at, status, total_duration_ms,
                planned, recorded, failures, baseline, rows_json
         FROM runs ORDER BY created_at DESC, run_id DESC LIMIT ?",
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter().map(parse_row).collect()
}

fn parse_row(row: &SqliteRow) -> Result<SummaryRecord> {
    let run_id: String = row.get("run_id");
    let kind: String = row.get("kind");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let rows_json: String = row.get("rows_json");

    Ok(SummaryRecord {
        run_id: run_id
            .parse()
            .with_context(|| format!("Invalid run id '{run_id}'"))?,
        kind: kind
            .parse()
            .with_context(|| format!("Invalid run kind '{kind}'"))?,
        label: row.get("label"),
        request_name: row.get("request_name"),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .context("Invalid created_at timestamp")?
            .with_timezone(&Utc),
        status: status
            .parse()
            .with_context(|| format!("Invalid run status '{status}'"))?,
        total_duration_ms: row.get("total_duration_ms"),
        planned: row.get("planned"),
        recorded: row.get("recorded"),
        failures: row.get("failures"),
        baseline: row.get("baseline"),
        rows: serde_json::from_str(&rows_json).context("Invalid rows JSON")?,
    })
}
