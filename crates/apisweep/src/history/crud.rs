//! Write operations for the history database

use super::db::DbPool;
use super::types::SummaryRecord;
use anyhow::Result;
use chrono::{Duration, SecondsFormat, Utc};

/// Insert a run summary
///
/// Timestamps are stored as fixed-width UTC RFC 3339 so they sort as text.
pub async fn insert_run(pool: &DbPool, record: &SummaryRecord) -> Result<()> {
    let rows_json = serde_json::to_string(&record.rows)?;

    sqlx::query(
        "INSERT INTO runs (run_id, kind, label, request_name, created_at, status,
                           total_duration_ms, planned, recorded, failures, baseline, rows_json)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(record.run_id.to_string())
    .bind(record.kind.as_ref())
    .bind(&record.label)
    .bind(&record.request_name)
    .bind(record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
    .bind(record.status.as_ref())
    .bind(record.total_duration_ms)
    .bind(record.planned)
    .bind(record.recorded)
    .bind(record.failures)
    .bind(record.baseline.as_deref())
    .bind(&rows_json)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete runs created more than `days` days ago
pub async fn delete_runs_older_than(pool: &DbPool, days: u32) -> Result<u64> {
    let cutoff = (Utc::now() - Duration::days(i64::from(days)))
        .to_rfc3339_opts(SecondsFormat::Micros, true);

    let result = sqlx::query("DELETE FROM runs WHERE created_at < ?")
        .bind(&cutoff)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::db::open_test_db;
    use crate::history::queries::recent_runs;
    use crate::orchestrator::{RunId, RunKind};
    use crate::reduce::RunStatus;

    fn record(label: &str, age_days: i64) -> SummaryRecord {
        SummaryRecord {
            run_id: RunId::new(),
            kind: RunKind::Compare,
            label: label.to_string(),
            request_name: "users".to_string(),
            created_at: Utc::now() - Duration::days(age_days),
            status: RunStatus::Completed,
            total_duration_ms: 42,
            planned: 2,
            recorded: 2,
            failures: 0,
            baseline: Some("dev".to_string()),
            rows: serde_json::json!([{"environment": "dev", "summary": "baseline"}]),
        }
    }

    #[tokio::test]
    async fn test_insert_run() {
        let pool = open_test_db().await.unwrap();
        let record = record("Compare users", 0);

        let result = insert_run(&pool, &record).await;
        assert!(result.is_ok(), "Should insert run successfully");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM runs WHERE run_id = ?")
            .bind(record.run_id.to_string())
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_run_id_fails() {
        let pool = open_test_db().await.unwrap();
        let record = record("Compare users", 0);
        insert_run(&pool, &record).await.unwrap();
        assert!(insert_run(&pool, &record).await.is_err());
    }

    #[tokio::test]
    async fn test_prune_old_runs() {
        let pool = open_test_db().await.unwrap();
        insert_run(&pool, &record("old", 40)).await.unwrap();
        insert_run(&pool, &record("new", 1)).await.unwrap();

        let deleted = delete_runs_older_than(&pool, 30).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = recent_runs(&pool, 10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].label, "new");
    }
}
