//! Risk bands

use serde::{Deserialize, Serialize};

/// Risk band for one indicator, or for the whole system.
///
/// Ordered `Green < Yellow < Red`, so the overall level is simply the maximum.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    #[default]
    Green = 0,
    Yellow = 1,
    Red = 2,
}

impl RiskLevel {
    /// Yellow or Red.
    pub fn is_abnormal(self) -> bool {
        self != RiskLevel::Green
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Green => write!(f, "GREEN"),
            RiskLevel::Yellow => write!(f, "YELLOW"),
            RiskLevel::Red => write!(f, "RED"),
        }
    }
}
