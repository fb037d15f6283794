//! Latency statistics
//!
//! `LatencyStats` summarizes a set of request durations with min/max/mean,
//! median, standard deviation and nearest-rank percentiles. The median is the
//! nearest-rank p50, so it is always one of the samples and never disagrees
//! with a reported p50. `Histogram`
//! buckets the same durations into a fixed number of equal-width bins.
//!
//! Both constructors return `None` for an empty input: callers report the
//! statistics as unavailable instead of dividing by zero.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single requested percentile and its nearest-rank value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Percentile {
    /// Requested percentile (0-100)
    pub rank: u8,
    /// Value at that percentile
    pub value: Duration,
}

/// Statistics for a collection of durations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Number of samples
    pub count: usize,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    /// Nearest-rank 50th percentile
    pub median: Duration,
    /// Sample standard deviation (zero for fewer than two samples)
    pub std_dev: Duration,
    /// Requested percentiles, in request order
    pub percentiles: Vec<Percentile>,
}

impl LatencyStats {
    /// Compute statistics from a slice of durations.
    ///
    /// Returns `None` when `durations` is empty.
    ///
    /// # Example
    /// ```
    /// use apisweep_common::stats::LatencyStats;
    /// use std::time::Duration;
    ///
    /// let samples = [10, 20, 30].map(Duration::from_millis);
    /// let stats = LatencyStats::from_durations(&samples, &[50, 99]).unwrap();
    /// assert_eq!(stats.min, Duration::from_millis(10));
    /// assert_eq!(stats.median, Duration::from_millis(20));
    /// assert_eq!(stats.max, Duration::from_millis(30));
    /// ```
    pub fn from_durations(durations: &[Duration], percentiles: &[u8]) -> Option<Self> {
        if durations.is_empty() {
            return None;
        }

        let mut sorted = durations.to_vec();
        sorted.sort_unstable();

        let count = sorted.len();
        let total: Duration = sorted.iter().sum();
        let mean = total / count as u32;

        let median = nearest_rank(&sorted, 50)?;

        let std_dev = if count < 2 {
            Duration::ZERO
        } else {
            let mean_secs = mean.as_secs_f64();
            let variance = sorted
                .iter()
                .map(|d| {
                    let delta = d.as_secs_f64() - mean_secs;
                    delta * delta
                })
                .sum::<f64>()
                / (count as f64 - 1.0);
            Duration::from_secs_f64(variance.sqrt())
        };

        let percentiles = percentiles
            .iter()
            .filter_map(|&rank| {
                nearest_rank(&sorted, rank).map(|value| Percentile { rank, value })
            })
            .collect();

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean,
            median,
            std_dev,
            percentiles,
        })
    }

    /// Look up a computed percentile by rank
    pub fn percentile(&self, rank: u8) -> Option<Duration> {
        self.percentiles
            .iter()
            .find(|p| p.rank == rank)
            .map(|p| p.value)
    }
}

/// Nearest-rank percentile over an already sorted slice.
///
/// The rank is `ceil(p / 100 * n)`, clamped to `1..=n`. Percentiles above
/// 100 are clamped to the maximum.
pub fn nearest_rank(sorted: &[Duration], percentile: u8) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let p = usize::from(percentile.min(100));
    let rank = (p * n).div_ceil(100).clamp(1, n);
    Some(sorted[rank - 1])
}

/// One histogram bin: `[lower, upper)`, the last bin also includes `upper`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub lower: Duration,
    pub upper: Duration,
    pub count: usize,
}

/// Fixed-bucket-count histogram spanning `min..=max` of the samples
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    pub buckets: Vec<HistogramBucket>,
}

impl Histogram {
    /// Build a histogram with exactly `bucket_count` equal-width buckets.
    ///
    /// Returns `None` for an empty input or a zero bucket count. When every
    /// sample is identical all of them land in the first bucket.
    pub fn from_durations(durations: &[Duration], bucket_count: usize) -> Option<Self> {
        if durations.is_empty() || bucket_count == 0 {
            return None;
        }

        let min = durations.iter().min().copied()?;
        let max = durations.iter().max().copied()?;
        let span = (max - min).as_nanos();
        let n = bucket_count as u128;
        // Interpolated bounds stay monotonic and end exactly at `max`
        let bound = |i: u128| min + nanos(span * i / n);

        let mut buckets: Vec<HistogramBucket> = (0..n)
            .map(|i| HistogramBucket {
                lower: bound(i),
                upper: bound(i + 1),
                count: 0,
            })
            .collect();

        for d in durations {
            let offset = (*d - min).as_nanos();
            let index = if span == 0 {
                0
            } else {
                ((offset * n / span) as usize).min(bucket_count - 1)
            };
            buckets[index].count += 1;
        }

        Some(Self { buckets })
    }

    /// Total number of samples across all buckets
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }
}

fn nanos(n: u128) -> Duration {
    Duration::from_nanos(u64::try_from(n).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_millis).collect()
    }

    #[test]
    fn test_three_samples() {
        let stats = LatencyStats::from_durations(&ms(&[30, 10, 20]), &[50, 90]).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, Duration::from_millis(10));
        assert_eq!(stats.max, Duration::from_millis(30));
        assert_eq!(stats.median, Duration::from_millis(20));
        assert_eq!(stats.mean, Duration::from_millis(20));
        assert_eq!(stats.percentile(50), Some(Duration::from_millis(20)));
        assert_eq!(stats.percentile(90), Some(Duration::from_millis(30)));
        assert_eq!(stats.percentile(99), None);
    }

    #[test]
    fn test_even_count_median_matches_p50() {
        let stats = LatencyStats::from_durations(&ms(&[10, 20, 30, 40]), &[50]).unwrap();
        assert_eq!(stats.median, Duration::from_millis(20));
        assert_eq!(stats.percentile(50), Some(stats.median));
    }

    #[test]
    fn test_empty_is_unavailable() {
        assert!(LatencyStats::from_durations(&[], &[50]).is_none());
        assert!(Histogram::from_durations(&[], 10).is_none());
    }

    #[test]
    fn test_single_sample_has_zero_std_dev() {
        let stats = LatencyStats::from_durations(&ms(&[42]), &[99]).unwrap();
        assert_eq!(stats.std_dev, Duration::ZERO);
        assert_eq!(stats.percentile(99), Some(Duration::from_millis(42)));
    }

    #[test]
    fn test_std_dev() {
        // Sample std dev of 2, 4, 4, 4, 5, 5, 7, 9 is ~2.138
        let stats = LatencyStats::from_durations(&ms(&[2, 4, 4, 4, 5, 5, 7, 9]), &[]).unwrap();
        let millis = stats.std_dev.as_secs_f64() * 1000.0;
        assert!((millis - 2.138).abs() < 0.01, "got {millis}");
    }

    #[test]
    fn test_nearest_rank() {
        let sorted = ms(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(nearest_rank(&sorted, 0), Some(Duration::from_millis(1)));
        assert_eq!(nearest_rank(&sorted, 50), Some(Duration::from_millis(5)));
        assert_eq!(nearest_rank(&sorted, 90), Some(Duration::from_millis(9)));
        assert_eq!(nearest_rank(&sorted, 95), Some(Duration::from_millis(10)));
        assert_eq!(nearest_rank(&sorted, 100), Some(Duration::from_millis(10)));
        assert_eq!(nearest_rank(&[], 50), None);
    }

    #[test]
    fn test_histogram_counts_every_sample() {
        let samples = ms(&[10, 11, 12, 50, 90, 100]);
        let hist = Histogram::from_durations(&samples, 5).unwrap();
        assert_eq!(hist.buckets.len(), 5);
        assert_eq!(hist.total(), samples.len());
        assert_eq!(hist.buckets[0].lower, Duration::from_millis(10));
        assert_eq!(hist.buckets[4].upper, Duration::from_millis(100));
        assert_eq!(hist.buckets[0].count, 3);
        assert_eq!(hist.buckets[4].count, 2);
    }

    #[test]
    fn test_histogram_identical_samples() {
        let hist = Histogram::from_durations(&ms(&[7, 7, 7]), 4).unwrap();
        assert_eq!(hist.buckets.len(), 4);
        assert_eq!(hist.buckets[0].count, 3);
        assert_eq!(hist.total(), 3);
    }

    #[test]
    fn test_histogram_span_narrower_than_bucket_count() {
        let samples = [Duration::from_nanos(100), Duration::from_nanos(102)];
        let hist = Histogram::from_durations(&samples, 10).unwrap();

        assert_eq!(hist.buckets.len(), 10);
        assert_eq!(hist.total(), 2);
        assert_eq!(hist.buckets[0].lower, Duration::from_nanos(100));
        assert_eq!(hist.buckets[9].upper, Duration::from_nanos(102));
        assert_eq!(hist.buckets[0].count, 1);
        assert_eq!(hist.buckets[9].count, 1);
        for bucket in &hist.buckets {
            assert!(bucket.lower <= bucket.upper, "{bucket:?}");
        }
        for pair in hist.buckets.windows(2) {
            assert_eq!(pair[0].upper, pair[1].lower);
        }
    }
}
