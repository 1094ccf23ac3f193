//! Indicator identity and readings

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Monitored drilling quantity.
///
/// The set is closed: boundaries, baselines and sequence numbers are all keyed
/// by this enum. Declaration order is also the deterministic iteration order
/// used wherever several indicators are processed in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Indicator {
    /// Return flow (%)
    ReturnFlowPercent,
    /// Pit gain (bbl)
    PitGainBbl,
    /// Standpipe pressure (psi)
    StandpipePressure,
    /// Rate of penetration (ft/hr)
    Rop,
    /// Weight on bit (lbs)
    Wob,
    /// Hook load (lbs)
    HookLoad,
    /// Mud weight (ppg)
    MudWeight,
}

impl Indicator {
    /// Every indicator, in declaration order.
    pub const ALL: [Indicator; 7] = [
        Indicator::ReturnFlowPercent,
        Indicator::PitGainBbl,
        Indicator::StandpipePressure,
        Indicator::Rop,
        Indicator::Wob,
        Indicator::HookLoad,
        Indicator::MudWeight,
    ];

    /// Operator-facing label with units.
    pub fn screen_name(self) -> &'static str {
        match self {
            Indicator::ReturnFlowPercent => "Return Flow (%)",
            Indicator::PitGainBbl => "Pit Gain (bbl)",
            Indicator::StandpipePressure => "SPP (psi)",
            Indicator::Rop => "ROP (ft/hr)",
            Indicator::Wob => "Weight on Bit (lbs)",
            Indicator::HookLoad => "Hook Load (lbs)",
            Indicator::MudWeight => "Mud Weight (ppg)",
        }
    }

    /// Key used for this indicator in `ewim_config.toml` (`[indicators.<key>]`).
    pub fn config_key(self) -> &'static str {
        match self {
            Indicator::ReturnFlowPercent => "return_flow_percent",
            Indicator::PitGainBbl => "pit_gain_bbl",
            Indicator::StandpipePressure => "standpipe_pressure",
            Indicator::Rop => "rop",
            Indicator::Wob => "wob",
            Indicator::HookLoad => "hook_load",
            Indicator::MudWeight => "mud_weight",
        }
    }

    /// Reverse of [`Indicator::config_key`].
    pub fn from_config_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.config_key() == key)
    }
}

impl std::fmt::Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Indicator::ReturnFlowPercent => "ReturnFlowPercent",
            Indicator::PitGainBbl => "PitGainBbl",
            Indicator::StandpipePressure => "StandpipePressure",
            Indicator::Rop => "Rop",
            Indicator::Wob => "Wob",
            Indicator::HookLoad => "HookLoad",
            Indicator::MudWeight => "MudWeight",
        };
        f.write_str(name)
    }
}

/// A single live value for one indicator, produced once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorReading {
    pub indicator: Indicator,
    pub value: f64,
}

impl IndicatorReading {
    pub fn new(indicator: Indicator, value: f64) -> Self {
        Self { indicator, value }
    }
}

/// One tick of live values, keyed by indicator.
pub type Readings = BTreeMap<Indicator, f64>;
