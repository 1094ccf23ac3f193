//! EWIM: Early Warning Indicator Matrix
//!
//! Dynamic threshold calibration and risk classification for drilling
//! process indicators.
//!
//! ## Architecture
//!
//! - **Boundary**: per-indicator Green/Yellow limits with a danger direction
//! - **Baseline**: capture sessions and their statistical summary
//! - **Calibration**: baseline → new boundaries under a chosen policy
//! - **Classifier**: live value → Green/Yellow/Red, overall risk
//! - **Sequencer**: order in which indicators became abnormal
//! - **Storage**: persisted boundaries and baseline history
//! - **Monitor**: the tick driver that owns all of the above

pub mod baseline;
pub mod boundary;
pub mod calibration;
pub mod classifier;
pub mod config;
pub mod frames;
pub mod monitor;
pub mod sequencer;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, EngineConfig};

// Re-export commonly used types
pub use types::{Indicator, IndicatorReading, Readings, RiskLevel};

pub use baseline::{
    BaselineSampler, BaselineSummary, CaptureCompleted, CaptureError, CaptureLimit, CaptureStatus, Clock,
    IndicatorBaseline, ManualClock, SystemClock,
};
pub use boundary::{Boundary, BoundarySet, Direction};
pub use calibration::{CalibrationError, CalibrationPolicy, CalibrationReport, Calibrator, IndicatorAnalysis};
pub use classifier::{overall_risk, Classifier, ZeroSentinel};
pub use monitor::{Monitor, MonitorError, MonitorSnapshot, TickReport};
pub use sequencer::{AbnormalitySequencer, SequenceSnapshot};
pub use storage::{BaselineHistory, BoundaryStore, StoreError};
