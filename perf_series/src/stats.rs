use std::fmt::Display;

use average::{concatenate, Estimate, Mean, Variance};
use itertools::Itertools;

use readable::num::*;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum StatsError {
    #[error("No samples left to compute a statistic from")]
    InsufficientSamples,

    #[error("Percentile {0} is outside of (0, 100]")]
    InvalidPercentile(f64),
}

/// Nearest-rank percentile of `samples` after optionally discarding the first
/// (oldest) sample.
///
/// The first sample is only discarded if at least one sample remains.
pub fn trimmed_percentile(
    samples: &[f64],
    percentile: f64,
    skip_first: bool,
) -> Result<f64, StatsError> {
    trimmed_percentile_with(samples, percentile, usize::from(skip_first))
}

/// Nearest-rank percentile of `samples` after discarding up to `trim_count`
/// leading samples. At least one sample is always kept.
pub fn trimmed_percentile_with(
    samples: &[f64],
    percentile: f64,
    trim_count: usize,
) -> Result<f64, StatsError> {
    if !(percentile > 0.0 && percentile <= 100.0) {
        return Err(StatsError::InvalidPercentile(percentile));
    }

    let trim = trim_count.min(samples.len().saturating_sub(1));
    let sorted = samples[trim..]
        .iter()
        .copied()
        .sorted_by(f64::total_cmp)
        .collect_vec();

    let n = sorted.len();
    if n == 0 {
        return Err(StatsError::InsufficientSamples);
    }

    let rank = ((percentile / 100.0 * n as f64).ceil() as usize)
        .saturating_sub(1)
        .min(n - 1);
    Ok(sorted[rank])
}

concatenate!(AggStats, [Mean, mean], [Variance, sample_variance]);

pub fn aggregate_measurements(measurements: impl Iterator<Item = f64>) -> Stats {
    let s: AggStats = measurements.collect();
    Stats {
        mean: s.mean(),
        stddev: s.sample_variance().sqrt(),
        len: s.mean.len() as usize,
    }
}

/// Descriptive summary of a sample, shown next to a verdict.
#[derive(Debug)]
pub struct Stats {
    pub mean: f64,
    pub stddev: f64,
    pub len: usize,
}

impl Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "μ: {} σ: {} n: {}",
            Float::from(self.mean),
            Float::from(self.stddev),
            Unsigned::from(self.len),
        )
    }
}
