//! Shared data structures for indicator risk classification
//!
//! - `Indicator`: the closed set of monitored drilling quantities
//! - `IndicatorReading` / `Readings`: one tick of live values
//! - `RiskLevel`: ordered Green < Yellow < Red band

mod indicator;
mod risk;

pub use indicator::*;
pub use risk::*;
