//! Latency profile reduction

use apisweep_common::defaults::{DEFAULT_HISTOGRAM_BUCKETS, DEFAULT_PERCENTILES};
use apisweep_common::{Histogram, IterationFailure, LatencyStats};
use std::time::Duration;

/// Raw measurements collected by a profile run
#[derive(Debug, Clone, Copy)]
pub struct ProfileInput<'a> {
    pub warmup: usize,
    pub measured: usize,
    /// Measured iterations that were recorded (successes, failures, cancellations)
    pub completed_measured: usize,
    pub success_durations: &'a [Duration],
    pub failures: &'a [IterationFailure],
    /// Time between the first measured dispatch and the last measured success
    pub window: Option<Duration>,
}

/// Reduced profile run
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileReport {
    pub warmup: usize,
    pub measured: usize,
    pub completed_measured: usize,
    pub successes: usize,
    pub failures: Vec<IterationFailure>,
    pub stats: Option<LatencyStats>,
    pub histogram: Option<Histogram>,
    /// Successes per second of wall-clock window
    pub wall_throughput: Option<f64>,
    /// Successes per second of summed request time
    pub no_delay_throughput: Option<f64>,
}

impl ProfileReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || self.successes == 0
    }

    pub fn measured_failures(&self) -> usize {
        self.failures.iter().filter(|f| !f.was_warmup).count()
    }
}

/// Reduce profile measurements into statistics
pub fn reduce(input: ProfileInput<'_>) -> ProfileReport {
    let durations = input.success_durations;
    let successes = durations.len();

    let stats = LatencyStats::from_durations(durations, &DEFAULT_PERCENTILES);
    let histogram = Histogram::from_durations(durations, DEFAULT_HISTOGRAM_BUCKETS);

    let wall_throughput = input
        .window
        .filter(|window| successes > 0 && !window.is_zero())
        .map(|window| successes as f64 / window.as_secs_f64());

    let busy: Duration = durations.iter().sum();
    let no_delay_throughput =
        (successes > 0 && !busy.is_zero()).then(|| successes as f64 / busy.as_secs_f64());

    ProfileReport {
        warmup: input.warmup,
        measured: input.measured,
        completed_measured: input.completed_measured,
        successes,
        failures: input.failures.to_vec(),
        stats,
        histogram,
        wall_throughput,
        no_delay_throughput,
    }
}
