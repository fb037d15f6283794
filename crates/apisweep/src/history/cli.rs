//! CLI operations for the run history

use super::crud::delete_runs_older_than;
use super::db::open_db;
use super::queries::recent_runs;
use anyhow::Result;
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

/// Print the most recent runs
pub async fn list_runs(limit: u32) -> Result<()> {
    let pool = open_db().await?;
    let runs = recent_runs(&pool, limit).await?;

    if runs.is_empty() {
        println!("No recorded runs");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Started"),
            Cell::new("Kind"),
            Cell::new("Label"),
            Cell::new("Status"),
            Cell::new("Iterations"),
            Cell::new("Failures"),
            Cell::new("Baseline"),
            Cell::new("Duration (s)"),
        ]);

    for run in runs {
        table.add_row(vec![
            Cell::new(run.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(run.kind.as_ref()),
            Cell::new(&run.label),
            Cell::new(run.status.as_ref()),
            Cell::new(format!("{}/{}", run.recorded, run.planned)),
            Cell::new(run.failures),
            Cell::new(run.baseline.as_deref().unwrap_or("-")),
            Cell::new(format!("{:.2}", run.total_duration_ms as f64 / 1000.0)),
        ]);
    }

    println!("{table}");

    Ok(())
}

/// Remove runs older than `days` days
pub async fn prune_runs(days: u32) -> Result<()> {
    let pool = open_db().await?;
    let deleted = delete_runs_older_than(&pool, days).await?;
    println!("Pruned {deleted} run records older than {days} days");
    Ok(())
}
