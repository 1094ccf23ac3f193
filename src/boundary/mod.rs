//! Risk Boundaries - per-indicator Green/Yellow band limits
//!
//! A [`Boundary`] is the `(green_max, yellow_max)` pair for one indicator plus
//! the [`Direction`] in which the quantity becomes dangerous. All comparisons
//! go through [`Direction::orient`], so a "lower is worse" indicator is
//! classified by mirroring the value and both limits rather than by a special
//! case in the comparison code.
//!
//! ## Bands (increasing-is-worse)
//!
//! | value                          | level  |
//! |--------------------------------|--------|
//! | `v >= yellow_max`              | Red    |
//! | `green_max <= v < yellow_max`  | Yellow |
//! | `v < green_max`                | Green  |
//!
//! For decreasing-is-worse the table applies to `-v`, `-green_max`,
//! `-yellow_max`: `v <= yellow_max` is Red, `yellow_max < v <= green_max` is
//! Yellow, anything above `green_max` is Green.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Indicator, RiskLevel};

// ============================================================================
// Direction
// ============================================================================

/// Which way a quantity moves when it becomes dangerous.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    #[serde(alias = "increasing")]
    IncreasingIsWorse,
    #[serde(alias = "decreasing")]
    DecreasingIsWorse,
}

impl Direction {
    /// Map a value into "increasing is worse" space.
    ///
    /// Self-inverse: `orient(orient(v)) == v`.
    pub fn orient(self, value: f64) -> f64 {
        match self {
            Direction::IncreasingIsWorse => value,
            Direction::DecreasingIsWorse => -value,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::IncreasingIsWorse => write!(f, "increasing-is-worse"),
            Direction::DecreasingIsWorse => write!(f, "decreasing-is-worse"),
        }
    }
}

// ============================================================================
// Boundary
// ============================================================================

/// Band limits for a single indicator.
/// Serialized as `greenMax`/`yellowMax`; snake_case keys are still accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Boundary {
    /// Edge between Green and Yellow
    #[serde(alias = "green_max")]
    pub green_max: f64,
    /// Edge between Yellow and Red
    #[serde(alias = "yellow_max")]
    pub yellow_max: f64,
    /// Files written before direction existed load as increasing-is-worse.
    #[serde(default)]
    pub direction: Direction,
}

impl Boundary {
    /// Increasing-is-worse boundary.
    pub fn new(green_max: f64, yellow_max: f64) -> Self {
        Self { green_max, yellow_max, direction: Direction::IncreasingIsWorse }
    }

    /// Decreasing-is-worse boundary (`green_max >= yellow_max`).
    pub fn decreasing(green_max: f64, yellow_max: f64) -> Self {
        Self { green_max, yellow_max, direction: Direction::DecreasingIsWorse }
    }

    pub fn with_direction(green_max: f64, yellow_max: f64, direction: Direction) -> Self {
        Self { green_max, yellow_max, direction }
    }

    /// Band for `value`. Does not apply the zero-sentinel rule; that belongs
    /// to the classifier.
    pub fn band(&self, value: f64) -> RiskLevel {
        let v = self.direction.orient(value);
        let green = self.direction.orient(self.green_max);
        let yellow = self.direction.orient(self.yellow_max);

        if v >= yellow {
            RiskLevel::Red
        } else if v >= green {
            RiskLevel::Yellow
        } else {
            RiskLevel::Green
        }
    }

    /// Both limits finite and Yellow lies beyond Green in the danger direction.
    pub fn is_well_ordered(&self) -> bool {
        self.green_max.is_finite()
            && self.yellow_max.is_finite()
            && self.direction.orient(self.green_max) <= self.direction.orient(self.yellow_max)
    }
}

// ============================================================================
// Boundary Set
// ============================================================================

/// Indicator → boundary mapping. Exactly one instance is active at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundarySet(BTreeMap<Indicator, Boundary>);

impl BoundarySet {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Built-in table used when neither the config file nor a persisted
    /// boundary file supplies one.
    pub fn builtin_defaults() -> Self {
        let mut set = Self::new();
        set.insert(Indicator::ReturnFlowPercent, Boundary::new(0.20, 0.30));
        set.insert(Indicator::PitGainBbl, Boundary::new(205.0, 210.0));
        set.insert(Indicator::StandpipePressure, Boundary::new(100.0, 200.0));
        set.insert(Indicator::Rop, Boundary::new(100.0, 200.0));
        set.insert(Indicator::Wob, Boundary::new(20_000.0, 40_000.0));
        set.insert(Indicator::HookLoad, Boundary::new(300_000.0, 500_000.0));
        set.insert(Indicator::MudWeight, Boundary::new(10.1, 11.0));
        set
    }

    pub fn get(&self, indicator: Indicator) -> Option<&Boundary> {
        self.0.get(&indicator)
    }

    pub fn insert(&mut self, indicator: Indicator, boundary: Boundary) -> Option<Boundary> {
        self.0.insert(indicator, boundary)
    }

    pub fn contains(&self, indicator: Indicator) -> bool {
        self.0.contains_key(&indicator)
    }

    pub fn direction_of(&self, indicator: Indicator) -> Option<Direction> {
        self.0.get(&indicator).map(|b| b.direction)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Indicator, &Boundary)> {
        self.0.iter().map(|(i, b)| (*i, b))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of `self` with every entry of `newer` replacing or adding to it.
    ///
    /// Calibration only produces boundaries for indicators present in the
    /// baseline; merging keeps the remaining indicators on their old limits.
    pub fn merged_with(&self, newer: &BoundarySet) -> BoundarySet {
        let mut merged = self.clone();
        for (indicator, boundary) in newer.iter() {
            merged.insert(indicator, *boundary);
        }
        merged
    }
}

impl FromIterator<(Indicator, Boundary)> for BoundarySet {
    fn from_iter<T: IntoIterator<Item = (Indicator, Boundary)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
