//! Baseline Capture Module - sampling "normal" behaviour for recalibration
//!
//! A capture session records one snapshot of live readings per tick until it
//! is stopped explicitly or its limit is reached. The retained snapshots are
//! then reduced to a [`BaselineSummary`] which the calibrator turns into new
//! boundaries.
//!
//! ## Architecture
//!
//! - `BaselineSampler`: owns at most one `CaptureSession`
//! - `CaptureLimit`: wall-clock duration or tick count
//! - `Clock`: time source (`SystemClock` in production, `ManualClock` for
//!   replays and tests)
//! - `statistics`: per-indicator reduction (mean, σ, percentiles)
//!
//! ## Usage
//!
//! ```ignore
//! let mut sampler = BaselineSampler::new(Box::new(SystemClock));
//! sampler.start_capture(CaptureLimit::seconds(60)?)?;
//!
//! // every tick
//! if let Some(done) = sampler.record_tick(&readings) {
//!     let summary = sampler.summarize()?;
//!     // calibrate, apply, then sampler.clear()
//! }
//! ```

pub mod statistics;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

use crate::types::{Indicator, Readings};

pub use statistics::{summarize, IndicatorBaseline, StatsError};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Baseline capture is already in progress")]
    AlreadyActive,

    #[error("No baseline capture in progress")]
    NotActive,

    #[error("No baseline samples captured")]
    NoSamples,

    #[error("Capture duration must be between 1 and {max} seconds (got {0})", max = MAX_CAPTURE_SECS)]
    InvalidDuration(i64),

    #[error("Statistics error: {0}")]
    Statistics(#[from] StatsError),
}

// ============================================================================
// Clock
// ============================================================================

/// Time source for capture sessions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock. Clones share the same instant, so a test or a
/// replay driver can keep a handle and advance it between ticks.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Capture Session
// ============================================================================

/// Longest accepted wall-clock capture (7 days).
pub const MAX_CAPTURE_SECS: i64 = 7 * 24 * 3600;

/// When a capture session stops on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureLimit {
    /// Stop once `now - started_at >= limit`
    Elapsed(Duration),
    /// Stop once this many snapshots have been recorded
    Ticks(usize),
}

impl CaptureLimit {
    /// Wall-clock limit, rejected outside `1..=MAX_CAPTURE_SECS`.
    pub fn seconds(secs: i64) -> Result<Self, CaptureError> {
        if !(1..=MAX_CAPTURE_SECS).contains(&secs) {
            return Err(CaptureError::InvalidDuration(secs));
        }
        Duration::try_seconds(secs)
            .map(CaptureLimit::Elapsed)
            .ok_or(CaptureError::InvalidDuration(secs))
    }
}

impl Default for CaptureLimit {
    fn default() -> Self {
        CaptureLimit::Elapsed(Duration::seconds(60))
    }
}

impl std::fmt::Display for CaptureLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureLimit::Elapsed(d) => write!(f, "{}s", d.num_seconds()),
            CaptureLimit::Ticks(n) => write!(f, "{n} ticks"),
        }
    }
}

#[derive(Debug, Clone)]
struct CaptureSession {
    started_at: DateTime<Utc>,
    limit: CaptureLimit,
    samples: Vec<Readings>,
    /// `None` while active
    stopped_at: Option<DateTime<Utc>>,
}

impl CaptureSession {
    fn is_active(&self) -> bool {
        self.stopped_at.is_none()
    }

    fn limit_reached(&self, now: DateTime<Utc>) -> bool {
        match self.limit {
            CaptureLimit::Elapsed(limit) => now - self.started_at >= limit,
            CaptureLimit::Ticks(n) => self.samples.len() >= n,
        }
    }
}

/// Emitted exactly once when a session goes from active to stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureCompleted {
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub sample_count: usize,
    /// `true` when the limit stopped the session, `false` for an explicit stop
    pub limit_reached: bool,
}

/// Observer view of the sampler for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureStatus {
    Idle,
    Capturing { sample_count: usize, elapsed_secs: i64 },
    /// Stopped with samples retained, waiting to be applied
    Ready { sample_count: usize },
}

// ============================================================================
// Baseline Summary
// ============================================================================

/// Per-indicator statistics of one capture session plus session metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSummary {
    pub capture_date: DateTime<Utc>,
    pub sample_count: usize,
    pub capture_duration_secs: i64,
    pub indicators: BTreeMap<Indicator, IndicatorBaseline>,
}

impl BaselineSummary {
    pub fn get(&self, indicator: Indicator) -> Option<&IndicatorBaseline> {
        self.indicators.get(&indicator)
    }
}

// ============================================================================
// Baseline Sampler
// ============================================================================

/// Records capture sessions. At most one session is active at a time; the
/// last stopped session's samples are retained until [`BaselineSampler::clear`]
/// or the next [`BaselineSampler::start_capture`].
pub struct BaselineSampler {
    clock: Box<dyn Clock>,
    session: Option<CaptureSession>,
}

impl std::fmt::Debug for BaselineSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaselineSampler")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Default for BaselineSampler {
    fn default() -> Self {
        Self::new(Box::new(SystemClock))
    }
}

impl BaselineSampler {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self { clock, session: None }
    }

    /// Begin a new session, discarding any retained samples.
    pub fn start_capture(&mut self, limit: CaptureLimit) -> Result<(), CaptureError> {
        if self.is_capturing() {
            return Err(CaptureError::AlreadyActive);
        }

        let started_at = self.clock.now();
        info!(%limit, "Starting baseline capture");
        self.session = Some(CaptureSession {
            started_at,
            limit,
            samples: Vec::new(),
            stopped_at: None,
        });
        Ok(())
    }

    /// Append one snapshot if a session is active.
    ///
    /// Returns the completion event when this snapshot brought the session to
    /// its limit. Non-finite values are dropped from the snapshot.
    pub fn record_tick(&mut self, readings: &Readings) -> Option<CaptureCompleted> {
        let now = self.clock.now();
        let session = self.session.as_mut().filter(|s| s.is_active())?;

        let snapshot: Readings = readings
            .iter()
            .filter(|(indicator, value)| {
                let keep = value.is_finite();
                if !keep {
                    debug!(indicator = %indicator, value, "Dropping non-finite sample");
                }
                keep
            })
            .map(|(i, v)| (*i, *v))
            .collect();
        session.samples.push(snapshot);

        if session.limit_reached(now) {
            return self.finish(true);
        }
        None
    }

    /// Stop the active session. Idempotent: returns `None` when nothing is
    /// capturing, so the completion event fires once per session.
    pub fn stop_capture(&mut self) -> Option<CaptureCompleted> {
        self.finish(false)
    }

    fn finish(&mut self, limit_reached: bool) -> Option<CaptureCompleted> {
        let now = self.clock.now();
        let session = self.session.as_mut().filter(|s| s.is_active())?;
        session.stopped_at = Some(now);

        info!(
            samples = session.samples.len(),
            limit_reached,
            "Baseline capture completed"
        );

        Some(CaptureCompleted {
            started_at: session.started_at,
            stopped_at: now,
            sample_count: session.samples.len(),
            limit_reached,
        })
    }

    pub fn is_capturing(&self) -> bool {
        self.session.as_ref().is_some_and(CaptureSession::is_active)
    }

    /// Snapshots in the active or retained session.
    pub fn sample_count(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.samples.len())
    }

    /// Time since the active session started; zero when not capturing.
    pub fn elapsed(&self) -> Duration {
        match &self.session {
            Some(s) if s.is_active() => self.clock.now() - s.started_at,
            _ => Duration::zero(),
        }
    }

    pub fn status(&self) -> CaptureStatus {
        match &self.session {
            Some(s) if s.is_active() => CaptureStatus::Capturing {
                sample_count: s.samples.len(),
                elapsed_secs: self.elapsed().num_seconds(),
            },
            Some(s) if !s.samples.is_empty() => CaptureStatus::Ready { sample_count: s.samples.len() },
            _ => CaptureStatus::Idle,
        }
    }

    /// Reduce the current session's snapshots to a baseline.
    ///
    /// Indicators that never appeared in a snapshot are left out of the
    /// summary rather than zero-filled.
    pub fn summarize(&self) -> Result<BaselineSummary, CaptureError> {
        let session = self.session.as_ref().ok_or(CaptureError::NoSamples)?;
        if session.samples.is_empty() {
            return Err(CaptureError::NoSamples);
        }

        let mut series: BTreeMap<Indicator, Vec<f64>> = BTreeMap::new();
        for snapshot in &session.samples {
            for (indicator, value) in snapshot {
                series.entry(*indicator).or_default().push(*value);
            }
        }
        if series.is_empty() {
            return Err(CaptureError::NoSamples);
        }

        let mut indicators = BTreeMap::new();
        for (indicator, values) in series {
            indicators.insert(indicator, summarize(&values)?);
        }

        let now = self.clock.now();
        let ended = session.stopped_at.unwrap_or(now);

        Ok(BaselineSummary {
            capture_date: now,
            sample_count: session.samples.len(),
            capture_duration_secs: (ended - session.started_at).num_seconds(),
            indicators,
        })
    }

    /// Discard retained samples and any active session.
    pub fn clear(&mut self) {
        if self.session.take().is_some() {
            debug!("Baseline samples cleared");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap())
    }

    fn readings(rop: f64, wob: f64) -> Readings {
        let mut r = Readings::new();
        r.insert(Indicator::Rop, rop);
        r.insert(Indicator::Wob, wob);
        r
    }

    #[test]
    fn test_tick_limit_auto_stops() {
        let mut sampler = BaselineSampler::new(Box::new(clock()));
        sampler.start_capture(CaptureLimit::Ticks(5)).unwrap();

        for i in 0..4 {
            assert!(sampler.record_tick(&readings(f64::from(i), 1.0)).is_none());
            assert!(sampler.is_capturing());
        }

        let done = sampler.record_tick(&readings(4.0, 1.0)).unwrap();
        assert_eq!(done.sample_count, 5);
        assert!(done.limit_reached);
        assert!(!sampler.is_capturing());

        // 6th tick is a no-op
        assert!(sampler.record_tick(&readings(5.0, 1.0)).is_none());
        assert_eq!(sampler.sample_count(), 5);
    }

    #[test]
    fn test_elapsed_limit_auto_stops() {
        let clock = clock();
        let mut sampler = BaselineSampler::new(Box::new(clock.clone()));
        sampler.start_capture(CaptureLimit::seconds(3).unwrap()).unwrap();

        assert!(sampler.record_tick(&readings(1.0, 1.0)).is_none());
        clock.advance(Duration::seconds(2));
        assert_eq!(sampler.elapsed(), Duration::seconds(2));
        assert!(sampler.record_tick(&readings(1.0, 1.0)).is_none());
        clock.advance(Duration::seconds(1));
        let done = sampler.record_tick(&readings(1.0, 1.0)).unwrap();
        assert_eq!(done.sample_count, 3);
        assert_eq!(sampler.elapsed(), Duration::zero());

        let summary = sampler.summarize().unwrap();
        assert_eq!(summary.capture_duration_secs, 3);
    }

    #[test]
    fn test_start_while_active_fails() {
        let mut sampler = BaselineSampler::new(Box::new(clock()));
        sampler.start_capture(CaptureLimit::Ticks(10)).unwrap();
        sampler.record_tick(&readings(1.0, 2.0));
        assert_eq!(
            sampler.start_capture(CaptureLimit::Ticks(10)),
            Err(CaptureError::AlreadyActive)
        );
        // state untouched
        assert_eq!(sampler.sample_count(), 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut sampler = BaselineSampler::new(Box::new(clock()));
        assert!(sampler.stop_capture().is_none());

        sampler.start_capture(CaptureLimit::Ticks(10)).unwrap();
        sampler.record_tick(&readings(1.0, 2.0));
        let done = sampler.stop_capture().unwrap();
        assert!(!done.limit_reached);
        assert!(sampler.stop_capture().is_none());
        assert_eq!(sampler.status(), CaptureStatus::Ready { sample_count: 1 });
    }

    #[test]
    fn test_record_when_idle_is_noop() {
        let mut sampler = BaselineSampler::new(Box::new(clock()));
        assert!(sampler.record_tick(&readings(1.0, 2.0)).is_none());
        assert_eq!(sampler.sample_count(), 0);
        assert_eq!(sampler.status(), CaptureStatus::Idle);
    }

    #[test]
    fn test_summarize_empty_session_is_error() {
        let mut sampler = BaselineSampler::new(Box::new(clock()));
        assert_eq!(sampler.summarize(), Err(CaptureError::NoSamples));
        sampler.start_capture(CaptureLimit::Ticks(3)).unwrap();
        sampler.stop_capture();
        assert_eq!(sampler.summarize(), Err(CaptureError::NoSamples));
    }

    #[test]
    fn test_summarize_per_indicator() {
        let mut sampler = BaselineSampler::new(Box::new(clock()));
        sampler.start_capture(CaptureLimit::Ticks(100)).unwrap();
        for v in [10.0, 12.0, 14.0, 16.0, 18.0] {
            sampler.record_tick(&readings(v, v * 1000.0));
        }
        sampler.stop_capture();

        let summary = sampler.summarize().unwrap();
        assert_eq!(summary.sample_count, 5);
        assert_eq!(summary.indicators.len(), 2);
        assert_eq!(summary.get(Indicator::Rop).unwrap().mean, 14.0);
        assert_eq!(summary.get(Indicator::Wob).unwrap().p95, 18_000.0);
        assert!(summary.get(Indicator::HookLoad).is_none());
    }

    #[test]
    fn test_non_finite_values_dropped() {
        let mut sampler = BaselineSampler::new(Box::new(clock()));
        sampler.start_capture(CaptureLimit::Ticks(100)).unwrap();
        sampler.record_tick(&readings(10.0, f64::NAN));
        sampler.record_tick(&readings(20.0, f64::INFINITY));
        sampler.stop_capture();

        let summary = sampler.summarize().unwrap();
        assert_eq!(summary.get(Indicator::Rop).unwrap().mean, 15.0);
        assert!(summary.get(Indicator::Wob).is_none());
    }

    #[test]
    fn test_restart_discards_retained_samples() {
        let mut sampler = BaselineSampler::new(Box::new(clock()));
        sampler.start_capture(CaptureLimit::Ticks(2)).unwrap();
        sampler.record_tick(&readings(1.0, 1.0));
        sampler.record_tick(&readings(1.0, 1.0));
        assert_eq!(sampler.sample_count(), 2);

        sampler.start_capture(CaptureLimit::Ticks(2)).unwrap();
        assert_eq!(sampler.sample_count(), 0);

        sampler.clear();
        assert!(!sampler.is_capturing());
        assert_eq!(sampler.status(), CaptureStatus::Idle);
    }

    #[test]
    fn test_out_of_range_duration_is_rejected() {
        assert_eq!(CaptureLimit::seconds(i64::MAX), Err(CaptureError::InvalidDuration(i64::MAX)));
        assert_eq!(CaptureLimit::seconds(0), Err(CaptureError::InvalidDuration(0)));
        assert_eq!(CaptureLimit::seconds(-5), Err(CaptureError::InvalidDuration(-5)));
        assert_eq!(
            CaptureLimit::seconds(MAX_CAPTURE_SECS),
            Ok(CaptureLimit::Elapsed(Duration::seconds(MAX_CAPTURE_SECS)))
        );
        assert_eq!(CaptureLimit::default(), CaptureLimit::seconds(60).unwrap());
    }
}
