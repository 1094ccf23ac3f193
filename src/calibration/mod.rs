//! Calibrator - turns a captured baseline into new risk boundaries
//!
//! Three policies are supported:
//!
//! | policy               | green_max                      | yellow_max                      |
//! |----------------------|--------------------------------|---------------------------------|
//! | `StandardDeviation`  | `max(mean + σ, mean × 1.1)`    | `max(mean + 2σ, mean × 1.2)`    |
//! | `Percentile`         | `p95`                          | `p99`                           |
//! | `StatisticalControl` | `mean + 2σ`                    | `mean + 3σ`                     |
//!
//! The formulas are written for increasing-is-worse indicators. For a
//! decreasing-is-worse indicator they are evaluated on the mirrored baseline
//! (`-mean`, `-p05`, `-p01`; σ is unchanged) and the result is mirrored back.
//! The floors are applied as an offset of `|mean| × (floor - 1)` beyond the
//! mean, which equals `mean × floor` for a positive increasing indicator and
//! keeps pointing in the danger direction once the mean is mirrored.
//!
//! The calibrator never touches the active boundaries; applying a result is
//! the monitor's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::baseline::{BaselineSummary, IndicatorBaseline};
use crate::boundary::{Boundary, BoundarySet, Direction};
use crate::types::Indicator;

/// Default floor multiplier on the mean for the Green edge.
pub const DEFAULT_GREEN_FLOOR: f64 = 1.1;
/// Default floor multiplier on the mean for the Yellow edge.
pub const DEFAULT_YELLOW_FLOOR: f64 = 1.2;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalibrationError {
    #[error("Indicator {0} has no baseline statistics")]
    UnknownIndicator(Indicator),

    #[error("Baseline contains no indicators")]
    EmptyBaseline,
}

// ============================================================================
// Policy
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationPolicy {
    #[default]
    StandardDeviation,
    Percentile,
    StatisticalControl,
}

impl CalibrationPolicy {
    pub const ALL: [CalibrationPolicy; 3] = [
        CalibrationPolicy::StandardDeviation,
        CalibrationPolicy::Percentile,
        CalibrationPolicy::StatisticalControl,
    ];
}

impl std::fmt::Display for CalibrationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationPolicy::StandardDeviation => write!(f, "standard_deviation"),
            CalibrationPolicy::Percentile => write!(f, "percentile"),
            CalibrationPolicy::StatisticalControl => write!(f, "statistical_control"),
        }
    }
}

impl std::str::FromStr for CalibrationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "standard_deviation" | "stddev" | "std_dev" => Ok(CalibrationPolicy::StandardDeviation),
            "percentile" => Ok(CalibrationPolicy::Percentile),
            "statistical_control" | "spc" => Ok(CalibrationPolicy::StatisticalControl),
            other => Err(format!("unknown calibration policy '{other}'")),
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// Before/after view of one indicator in a calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorAnalysis {
    pub baseline_mean: f64,
    pub baseline_std_dev: f64,
    pub baseline_range: f64,
    pub new_green_max: f64,
    pub new_yellow_max: f64,
    pub old_green_max: Option<f64>,
    pub old_yellow_max: Option<f64>,
    /// `(new - old) / old * 100`; absent without an old limit or when it was 0
    pub green_change_pct: Option<f64>,
    pub yellow_change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub calibration_date: DateTime<Utc>,
    pub policy: CalibrationPolicy,
    pub baseline: BaselineSummary,
    pub new_boundaries: BoundarySet,
    pub old_boundaries: Option<BoundarySet>,
    pub analysis: BTreeMap<Indicator, IndicatorAnalysis>,
}

/// Floor limit in oriented space: `floor - 1` of the mean's magnitude past the mean.
fn floor_limit(oriented_mean: f64, floor: f64) -> f64 {
    oriented_mean + oriented_mean.abs() * (floor - 1.0)
}

fn percent_change(old: f64, new: f64) -> Option<f64> {
    if old == 0.0 {
        None
    } else {
        Some((new - old) / old * 100.0)
    }
}

// ============================================================================
// Calibrator
// ============================================================================

#[derive(Debug, Clone)]
pub struct Calibrator {
    green_floor: f64,
    yellow_floor: f64,
    directions: BTreeMap<Indicator, Direction>,
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(DEFAULT_GREEN_FLOOR, DEFAULT_YELLOW_FLOOR)
    }
}

impl Calibrator {
    pub fn new(green_floor: f64, yellow_floor: f64) -> Self {
        Self { green_floor, yellow_floor, directions: BTreeMap::new() }
    }

    /// Take each indicator's direction from `boundaries`. Indicators not in
    /// the set calibrate as increasing-is-worse.
    pub fn with_directions_from(mut self, boundaries: &BoundarySet) -> Self {
        self.directions = boundaries.iter().map(|(i, b)| (i, b.direction)).collect();
        self
    }

    pub fn direction_of(&self, indicator: Indicator) -> Direction {
        self.directions.get(&indicator).copied().unwrap_or_default()
    }

    /// New boundaries for every indicator in the baseline.
    pub fn calibrate(
        &self,
        summary: &BaselineSummary,
        policy: CalibrationPolicy,
    ) -> Result<BoundarySet, CalibrationError> {
        if summary.indicators.is_empty() {
            return Err(CalibrationError::EmptyBaseline);
        }

        let boundaries: BoundarySet = summary
            .indicators
            .iter()
            .map(|(&indicator, stats)| (indicator, self.boundary_for(indicator, stats, policy)))
            .collect();

        info!(
            %policy,
            indicators = boundaries.len(),
            samples = summary.sample_count,
            "Calibrated boundaries from baseline"
        );
        Ok(boundaries)
    }

    /// New boundary for a single indicator.
    pub fn calibrate_indicator(
        &self,
        summary: &BaselineSummary,
        indicator: Indicator,
        policy: CalibrationPolicy,
    ) -> Result<Boundary, CalibrationError> {
        let stats = summary.get(indicator).ok_or(CalibrationError::UnknownIndicator(indicator))?;
        Ok(self.boundary_for(indicator, stats, policy))
    }

    fn boundary_for(&self, indicator: Indicator, stats: &IndicatorBaseline, policy: CalibrationPolicy) -> Boundary {
        let direction = self.direction_of(indicator);
        let mean = direction.orient(stats.mean);
        let sigma = stats.std_dev;

        let (green, yellow) = match policy {
            CalibrationPolicy::StandardDeviation => (
                (mean + sigma).max(floor_limit(mean, self.green_floor)),
                (mean + 2.0 * sigma).max(floor_limit(mean, self.yellow_floor)),
            ),
            CalibrationPolicy::Percentile => match direction {
                Direction::IncreasingIsWorse => (stats.p95, stats.p99),
                Direction::DecreasingIsWorse => (-stats.p05, -stats.p01),
            },
            CalibrationPolicy::StatisticalControl => (mean + 2.0 * sigma, mean + 3.0 * sigma),
        };

        let boundary = Boundary::with_direction(direction.orient(green), direction.orient(yellow), direction);
        debug!(
            indicator = %indicator,
            %direction,
            green_max = boundary.green_max,
            yellow_max = boundary.yellow_max,
            "Calibrated indicator"
        );
        boundary
    }

    /// Before/after report. Does not mutate anything.
    pub fn generate_report(
        &self,
        summary: &BaselineSummary,
        policy: CalibrationPolicy,
        new: &BoundarySet,
        old: Option<&BoundarySet>,
        calibration_date: DateTime<Utc>,
    ) -> Result<CalibrationReport, CalibrationError> {
        let mut analysis = BTreeMap::new();

        for (indicator, boundary) in new.iter() {
            let stats = summary.get(indicator).ok_or(CalibrationError::UnknownIndicator(indicator))?;
            let previous = old.and_then(|o| o.get(indicator));

            analysis.insert(
                indicator,
                IndicatorAnalysis {
                    baseline_mean: stats.mean,
                    baseline_std_dev: stats.std_dev,
                    baseline_range: stats.range(),
                    new_green_max: boundary.green_max,
                    new_yellow_max: boundary.yellow_max,
                    old_green_max: previous.map(|b| b.green_max),
                    old_yellow_max: previous.map(|b| b.yellow_max),
                    green_change_pct: previous.and_then(|b| percent_change(b.green_max, boundary.green_max)),
                    yellow_change_pct: previous.and_then(|b| percent_change(b.yellow_max, boundary.yellow_max)),
                },
            );
        }

        Ok(CalibrationReport {
            calibration_date,
            policy,
            baseline: summary.clone(),
            new_boundaries: new.clone(),
            old_boundaries: old.cloned(),
            analysis,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
