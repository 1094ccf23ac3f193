//! Descriptive statistics over a captured sample series
//!
//! Mean and population standard deviation come from `statrs`; median and
//! percentiles are computed over a sorted copy using the nearest-rank rule
//! (`index = ceil(p * N) - 1`, clamped), never interpolated, so the same
//! series always yields bit-identical limits.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    #[error("No samples to summarize")]
    NoSamples,

    #[error("Sample series contains a non-finite value at position {0}")]
    NonFinite(usize),
}

/// Statistical summary of one indicator over a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorBaseline {
    pub mean: f64,
    /// Population standard deviation (divides by N)
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    /// Nearest-rank 95th percentile
    pub p95: f64,
    /// Nearest-rank 99th percentile
    pub p99: f64,
    /// Lower-tail mirror of `p95` (p95 of the negated series, negated back)
    #[serde(default)]
    pub p05: f64,
    /// Lower-tail mirror of `p99`
    #[serde(default)]
    pub p01: f64,
}

impl IndicatorBaseline {
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

/// Reduce a series to its descriptive statistics.
pub fn summarize(samples: &[f64]) -> Result<IndicatorBaseline, StatsError> {
    if samples.is_empty() {
        return Err(StatsError::NoSamples);
    }
    if let Some(pos) = samples.iter().position(|v| !v.is_finite()) {
        return Err(StatsError::NonFinite(pos));
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    Ok(IndicatorBaseline {
        mean: Statistics::mean(samples.iter()),
        std_dev: Statistics::population_std_dev(samples.iter()),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        median: median_of_sorted(&sorted),
        p95: percentile_of_sorted(&sorted, 0.95),
        p99: percentile_of_sorted(&sorted, 0.99),
        p05: lower_tail_of_sorted(&sorted, 0.95),
        p01: lower_tail_of_sorted(&sorted, 0.99),
    })
}

/// Index of the nearest-rank percentile `p` in a sorted series of length `n`.
fn nearest_rank_index(p: f64, n: usize) -> usize {
    debug_assert!(n > 0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let rank = (p * n as f64).ceil() as i64 - 1;
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    let index = rank.clamp(0, n as i64 - 1) as usize;
    index
}

/// Nearest-rank percentile of an ascending series.
pub fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    sorted[nearest_rank_index(p, sorted.len())]
}

/// Nearest-rank percentile `p` of the negated series, negated back.
///
/// Sorting `-x` ascending reverses `x`, so rank `k` of the mirror is element
/// `n - 1 - k` of the ascending series.
fn lower_tail_of_sorted(sorted: &[f64], p: f64) -> f64 {
    sorted[sorted.len() - 1 - nearest_rank_index(p, sorted.len())]
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}
