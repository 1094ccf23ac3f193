//! Monitor - the tick driver
//!
//! Owns every piece of mutable engine state: the active boundary set, the
//! capture sampler, the abnormality sequencer, the store and the history.
//! All mutation goes through `&mut self`, so no locking is needed; callers
//! that share a monitor across tasks wrap it themselves.
//!
//! ## Tick order
//!
//! 1. Record the readings into the capture session (if one is active)
//! 2. Classify every reading against the active boundaries
//! 3. Update the abnormality sequence
//! 4. If step 1 completed the capture and auto-apply is on, calibrate and
//!    apply new boundaries (the next tick classifies against them)
//!
//! A calibration or persistence failure in step 4 is reported in the
//! [`TickReport`]; the classification of the tick still stands.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::baseline::{
    BaselineSampler, BaselineSummary, CaptureCompleted, CaptureError, CaptureLimit, CaptureStatus, Clock,
    SystemClock,
};
use crate::boundary::BoundarySet;
use crate::calibration::{CalibrationError, CalibrationPolicy, CalibrationReport, Calibrator};
use crate::classifier::{overall_risk, Classifier};
use crate::config::EngineConfig;
use crate::sequencer::{AbnormalitySequencer, SequenceSnapshot};
use crate::storage::{BaselineHistory, BoundaryStore, StoreError};
use crate::types::{Indicator, Readings, RiskLevel};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// Outcomes & Snapshots
// ============================================================================

/// Everything that happened in one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub levels: BTreeMap<Indicator, RiskLevel>,
    pub overall: RiskLevel,
    pub sequence: SequenceSnapshot,
    /// Set when this tick brought a capture session to its limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_completed: Option<CaptureCompleted>,
    /// Set when auto-apply calibrated new boundaries this tick
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationReport>,
    /// Set when auto-apply was attempted and failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration_error: Option<String>,
}

/// Read-only view for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub boundaries: BoundarySet,
    pub levels: BTreeMap<Indicator, RiskLevel>,
    pub overall: RiskLevel,
    pub sequence: SequenceSnapshot,
    pub capture: CaptureStatus,
    pub policy: CalibrationPolicy,
    pub auto_apply: bool,
    pub last_report: Option<CalibrationReport>,
}

// ============================================================================
// Monitor
// ============================================================================

pub struct Monitor {
    boundaries: BoundarySet,
    classifier: Classifier,
    sampler: BaselineSampler,
    sequencer: AbnormalitySequencer,
    calibrator: Calibrator,
    store: BoundaryStore,
    history: BaselineHistory,
    clock: Box<dyn Clock>,
    capture_limit: CaptureLimit,
    policy: CalibrationPolicy,
    auto_apply: bool,
    levels: BTreeMap<Indicator, RiskLevel>,
    overall: RiskLevel,
    last_report: Option<CalibrationReport>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("boundaries", &self.boundaries)
            .field("sampler", &self.sampler)
            .field("sequencer", &self.sequencer)
            .field("policy", &self.policy)
            .field("overall", &self.overall)
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Monitor on the wall clock. Loads persisted boundaries from the
    /// configured data directory, falling back to the configured defaults.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    /// Monitor on an explicit clock, shared by the sampler and the reports.
    pub fn with_clock<C>(config: &EngineConfig, clock: C) -> Self
    where
        C: Clock + Clone + 'static,
    {
        let defaults = config.default_boundaries();
        let store = BoundaryStore::new(&config.storage.data_dir, defaults.clone());
        let boundaries = store.load();

        let calibrator = Calibrator::new(config.calibration.green_floor, config.calibration.yellow_floor)
            .with_directions_from(&defaults);
        let capture_limit = config.capture.limit().unwrap_or_else(|e| {
            warn!(error = %e, "Invalid capture limit in config, using default");
            CaptureLimit::default()
        });

        info!(
            data_dir = %config.storage.data_dir.display(),
            indicators = boundaries.len(),
            policy = %config.calibration.policy,
            auto_apply = config.calibration.auto_apply,
            "Monitor initialised"
        );

        Self {
            boundaries,
            classifier: Classifier::new(config.classification.zero_sentinel),
            sampler: BaselineSampler::new(Box::new(clock.clone())),
            sequencer: AbnormalitySequencer::new(),
            calibrator,
            store,
            history: BaselineHistory::new(&config.storage.data_dir, config.storage.history_capacity),
            clock: Box::new(clock),
            capture_limit,
            policy: config.calibration.policy,
            auto_apply: config.calibration.auto_apply,
            levels: BTreeMap::new(),
            overall: RiskLevel::Green,
            last_report: None,
        }
    }

    /// Process one tick of live readings.
    pub fn tick(&mut self, readings: &Readings) -> TickReport {
        let capture_completed = self.sampler.record_tick(readings);

        let levels = self.classifier.classify_all(readings, &self.boundaries);
        self.sequencer.update_all(&levels);
        let overall = overall_risk(levels.values().copied());

        if overall != self.overall {
            info!(from = %self.overall, to = %overall, "Overall risk changed");
        }
        self.levels = levels;
        self.overall = overall;

        let mut calibration = None;
        let mut calibration_error = None;
        if capture_completed.is_some() && self.auto_apply {
            match self.apply_calibration(None) {
                Ok(report) => calibration = Some(report),
                Err(e) => {
                    warn!(error = %e, "Automatic calibration failed, keeping current boundaries");
                    calibration_error = Some(e.to_string());
                }
            }
        }

        TickReport {
            levels: self.levels.clone(),
            overall,
            sequence: self.sequencer.snapshot(),
            capture_completed,
            calibration,
            calibration_error,
        }
    }

    /// Start a capture with the configured limit.
    pub fn start_capture(&mut self) -> Result<(), MonitorError> {
        self.start_capture_with(self.capture_limit)
    }

    pub fn start_capture_with(&mut self, limit: CaptureLimit) -> Result<(), MonitorError> {
        self.sampler.start_capture(limit)?;
        Ok(())
    }

    /// Stop the active capture. With auto-apply on, the retained samples are
    /// calibrated and applied immediately and the report is returned.
    pub fn stop_capture(&mut self) -> Result<Option<CalibrationReport>, MonitorError> {
        let completed = self.sampler.stop_capture().ok_or(CaptureError::NotActive)?;
        info!(samples = completed.sample_count, "Baseline capture stopped");

        if self.auto_apply {
            return self.apply_calibration(None).map(Some);
        }
        Ok(None)
    }

    /// Calibrate from the retained samples and make the result active.
    ///
    /// New boundaries replace the active ones indicator by indicator;
    /// indicators absent from the baseline keep their limits. If persisting
    /// fails the active set is left unchanged. A failed history append is
    /// only logged.
    pub fn apply_calibration(&mut self, policy: Option<CalibrationPolicy>) -> Result<CalibrationReport, MonitorError> {
        if self.sampler.is_capturing() {
            return Err(CaptureError::AlreadyActive.into());
        }
        let policy = policy.unwrap_or(self.policy);

        let summary = self.sampler.summarize()?;
        let calibrated = self.calibrator.calibrate(&summary, policy)?;
        let report =
            self.calibrator
                .generate_report(&summary, policy, &calibrated, Some(&self.boundaries), self.clock.now())?;

        let merged = self.boundaries.merged_with(&calibrated);
        self.store.save(&merged, Some(&summary))?;
        self.boundaries = merged;

        if let Err(e) = self.history.append(&summary) {
            warn!(error = %e, "Failed to append baseline history");
        }
        self.sampler.clear();

        info!(
            %policy,
            indicators = calibrated.len(),
            samples = summary.sample_count,
            "Calibration applied"
        );
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Back up the persisted file and restore the configured defaults.
    pub fn reset_boundaries(&mut self) -> Result<(), MonitorError> {
        self.boundaries = self.store.reset_to_defaults()?;
        Ok(())
    }

    pub fn reset_sequence(&mut self) {
        self.sequencer.reset();
    }

    pub fn set_policy(&mut self, policy: CalibrationPolicy) {
        info!(%policy, "Calibration policy changed");
        self.policy = policy;
    }

    pub fn policy(&self) -> CalibrationPolicy {
        self.policy
    }

    pub fn boundaries(&self) -> &BoundarySet {
        &self.boundaries
    }

    pub fn levels(&self) -> &BTreeMap<Indicator, RiskLevel> {
        &self.levels
    }

    pub fn overall_risk(&self) -> RiskLevel {
        self.overall
    }

    pub fn sequencer(&self) -> &AbnormalitySequencer {
        &self.sequencer
    }

    pub fn capture_status(&self) -> CaptureStatus {
        self.sampler.status()
    }

    pub fn last_report(&self) -> Option<&CalibrationReport> {
        self.last_report.as_ref()
    }

    pub fn baseline_history(&self) -> Vec<BaselineSummary> {
        self.history.history()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            boundaries: self.boundaries.clone(),
            levels: self.levels.clone(),
            overall: self.overall,
            sequence: self.sequencer.snapshot(),
            capture: self.sampler.status(),
            policy: self.policy,
            auto_apply: self.auto_apply,
            last_report: self.last_report.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
