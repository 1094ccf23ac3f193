//! Risk classification of live indicator values
//!
//! Rules, in order:
//! 1. No boundary configured for the indicator → Green (monitoring never
//!    blocks on missing configuration)
//! 2. Value is exactly `0.0` and the zero-sentinel policy is enabled → Green
//!    (the feed is treated as not yet reporting)
//! 3. Otherwise the boundary band, see [`Boundary::band`]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::boundary::{Boundary, BoundarySet};
use crate::types::{Indicator, IndicatorReading, Readings, RiskLevel};

/// How an exact `0.0` reading is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroSentinel {
    /// `0.0` means the sensor is not reporting yet; classify as Green
    #[default]
    NotReporting,
    /// `0.0` is a real measurement and goes through the band comparison
    Disabled,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    zero_sentinel: ZeroSentinel,
}

impl Classifier {
    pub fn new(zero_sentinel: ZeroSentinel) -> Self {
        Self { zero_sentinel }
    }

    pub fn zero_sentinel(&self) -> ZeroSentinel {
        self.zero_sentinel
    }

    pub fn classify(&self, reading: IndicatorReading, boundary: Option<&Boundary>) -> RiskLevel {
        let Some(boundary) = boundary else {
            return RiskLevel::Green;
        };

        if self.zero_sentinel == ZeroSentinel::NotReporting && reading.value == 0.0 {
            return RiskLevel::Green;
        }

        boundary.band(reading.value)
    }

    /// Classify every reading of one tick against `boundaries`.
    pub fn classify_all(&self, readings: &Readings, boundaries: &BoundarySet) -> BTreeMap<Indicator, RiskLevel> {
        readings
            .iter()
            .map(|(&indicator, &value)| {
                let level = self.classify(IndicatorReading::new(indicator, value), boundaries.get(indicator));
                (indicator, level)
            })
            .collect()
    }
}

/// Red if any Red, else Yellow if any Yellow, else Green (also for no levels).
pub fn overall_risk<I>(levels: I) -> RiskLevel
where
    I: IntoIterator<Item = RiskLevel>,
{
    levels.into_iter().max().unwrap_or(RiskLevel::Green)
}
