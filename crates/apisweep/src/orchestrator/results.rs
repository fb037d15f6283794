//! Report writing and summary display
//!
//! Prints finalized reports as tables and writes them to JSON files.

use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde_json::json;
use tracing::info;

use super::render::RenderedResponse;
use crate::history::condensed_rows;
use crate::reduce::{ComparisonReport, FinalReport, ProfileReport, RunReport, SendReport};

fn format_ms(duration: Option<Duration>) -> String {
    duration
        .map(|d| format!("{:.1}", d.as_secs_f64() * 1000.0))
        .unwrap_or_else(|| "-".to_string())
}

fn ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(Cell::new).collect::<Vec<_>>());
    table
}

/// Print a finalized report to stdout
pub fn print_report(report: &FinalReport) {
    println!("\n=== {} ({}) ===\n", report.label, report.status());
    match &report.report {
        RunReport::Send(send) => print_send(send),
        RunReport::Comparison(compare) => print_comparison(compare),
        RunReport::Profile(profile) => print_profile(profile),
    }
    if let Some(reason) = &report.cancel_reason {
        println!("Canceled: {reason}");
    }
}

/// Print a rendered response body
pub fn print_response(response: &RenderedResponse) {
    println!("{}", response.title);
    for (name, value) in &response.headers {
        println!("{name}: {value}");
    }
    if !response.body.is_empty() {
        println!("\n{}", response.body);
    }
}

fn print_send(send: &SendReport) {
    let mut table = new_table(&["Environment", "Code", "Time (ms)", "Result"]);
    table.add_row(vec![
        Cell::new(send.environment.as_deref().unwrap_or("-")),
        Cell::new(send.code.as_deref().unwrap_or("-")),
        Cell::new(format_ms(send.duration)),
        Cell::new(
            send.verdict
                .as_ref()
                .map(|v| v.reason().unwrap_or("ok"))
                .unwrap_or("-"),
        ),
    ]);
    println!("{table}");
}

fn print_comparison(compare: &ComparisonReport) {
    let mut table = new_table(&["Environment", "Status", "Code", "Time (ms)", "Summary"]);
    for row in &compare.rows {
        let name = if row.is_baseline {
            format!("{}*", row.environment)
        } else {
            row.environment.clone()
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(row.status.as_ref()),
            Cell::new(row.code.as_deref().unwrap_or("-")),
            Cell::new(format_ms(row.duration)),
            Cell::new(&row.summary),
        ]);
    }
    println!("{table}");
    if compare.rows.len() < compare.planned {
        println!("{} of {} environments not run", compare.planned - compare.rows.len(), compare.planned);
    }
    if compare.baseline_fallback {
        println!("Configured baseline not found; first row used as baseline");
    }
}

fn print_profile(profile: &ProfileReport) {
    println!(
        "Measured {}/{} (warmup {}), {} ok, {} failed",
        profile.completed_measured,
        profile.measured,
        profile.warmup,
        profile.successes,
        profile.failures.len()
    );

    let Some(stats) = &profile.stats else {
        println!("No successful measurements");
        print_failures(profile);
        return;
    };

    let mut table = new_table(&["Min", "Mean", "Median", "Std dev", "p50", "p90", "p95", "p99", "Max"]);
    table.add_row(vec![
        Cell::new(format_ms(Some(stats.min))),
        Cell::new(format_ms(Some(stats.mean))),
        Cell::new(format_ms(Some(stats.median))),
        Cell::new(format_ms(Some(stats.std_dev))),
        Cell::new(format_ms(stats.percentile(50))),
        Cell::new(format_ms(stats.percentile(90))),
        Cell::new(format_ms(stats.percentile(95))),
        Cell::new(format_ms(stats.percentile(99))),
        Cell::new(format_ms(Some(stats.max))),
    ]);
    println!("Latency (ms)\n{table}");

    if let Some(histogram) = &profile.histogram {
        let mut table = new_table(&["Bucket (ms)", "Count"]);
        for bucket in &histogram.buckets {
            table.add_row(vec![
                Cell::new(format!("{:.1} - {:.1}", ms(bucket.lower), ms(bucket.upper))),
                Cell::new(bucket.count),
            ]);
        }
        println!("{table}");
    }

    let throughput = |value: Option<f64>| {
        value
            .map(|v| format!("{v:.2} req/s"))
            .unwrap_or_else(|| "-".to_string())
    };
    println!(
        "Throughput: {} wall, {} without delays",
        throughput(profile.wall_throughput),
        throughput(profile.no_delay_throughput)
    );
    print_failures(profile);
}

fn print_failures(profile: &ProfileReport) {
    if profile.failures.is_empty() {
        return;
    }
    let mut table = new_table(&["Iteration", "Phase", "Code", "Time (ms)", "Reason"]);
    for failure in &profile.failures {
        table.add_row(vec![
            Cell::new(failure.iteration + 1),
            Cell::new(if failure.was_warmup { "warmup" } else { "measured" }),
            Cell::new(failure.status_label.as_deref().unwrap_or("-")),
            Cell::new(format_ms(Some(failure.duration))),
            Cell::new(&failure.reason),
        ]);
    }
    println!("Failures\n{table}");
}

/// JSON document for a finalized report
pub fn report_json(report: &FinalReport) -> serde_json::Value {
    let details = match &report.report {
        RunReport::Profile(profile) => json!({
            "warmup": profile.warmup,
            "measured": profile.measured,
            "completed_measured": profile.completed_measured,
            "successes": profile.successes,
            "stats": profile.stats.as_ref().map(|s| json!({
                "min_ms": ms(s.min),
                "max_ms": ms(s.max),
                "mean_ms": ms(s.mean),
                "median_ms": ms(s.median),
                "std_dev_ms": ms(s.std_dev),
                "percentiles_ms": s.percentiles.iter()
                    .map(|p| (format!("p{}", p.rank), json!(ms(p.value))))
                    .collect::<serde_json::Map<_, _>>(),
            })),
            "histogram": profile.histogram.as_ref().map(|h| h.buckets.iter().map(|b| json!({
                "lower_ms": ms(b.lower),
                "upper_ms": ms(b.upper),
                "count": b.count,
            })).collect::<Vec<_>>()),
            "wall_throughput": profile.wall_throughput,
            "no_delay_throughput": profile.no_delay_throughput,
            "failures": profile.failures.iter().map(|f| json!({
                "iteration": f.iteration,
                "was_warmup": f.was_warmup,
                "reason": f.reason,
                "status": f.status_label,
                "duration_ms": ms(f.duration),
            })).collect::<Vec<_>>(),
        }),
        RunReport::Comparison(compare) => json!({
            "baseline": compare.baseline_environment(),
            "baseline_fallback": compare.baseline_fallback,
            "planned": compare.planned,
            "rows": condensed_rows(&report.report),
        }),
        RunReport::Send(_) => json!({
            "rows": condensed_rows(&report.report),
        }),
    };

    json!({
        "run_id": report.run_id.to_string(),
        "kind": report.kind.as_ref(),
        "label": report.label,
        "request": report.request_name,
        "started_at": report.started_at.to_rfc3339(),
        "elapsed_seconds": report.elapsed.as_secs_f64(),
        "status": report.status().as_ref(),
        "cancel_reason": report.cancel_reason,
        "planned": report.planned,
        "recorded": report.recorded,
        "written_at": chrono::Utc::now().to_rfc3339(),
        "report": details,
    })
}

/// Write a finalized report as pretty JSON
pub fn write_report(report: &FinalReport, output_path: &str) -> Result<()> {
    let output = report_json(report);
    std::fs::write(output_path, serde_json::to_string_pretty(&output)?)
        .with_context(|| format!("Failed to write report to {output_path}"))?;
    info!(path = %output_path, "Report written");
    Ok(())
}
