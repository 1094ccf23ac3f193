//! Engine Configuration - capture, calibration, classification and storage
//! settings as operator-tunable TOML values
//!
//! Every field has a default, so an empty file (or no file) gives the
//! built-in behaviour. Per-indicator default boundaries live under
//! `[indicators.<config_key>]` and override the built-in table entry by entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::baseline::{CaptureError, CaptureLimit, MAX_CAPTURE_SECS};
use crate::boundary::{Boundary, BoundarySet, Direction};
use crate::calibration::{CalibrationPolicy, DEFAULT_GREEN_FLOOR, DEFAULT_YELLOW_FLOOR};
use crate::classifier::ZeroSentinel;
use crate::storage::DEFAULT_HISTORY_CAPACITY;
use crate::types::Indicator;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "EWIM_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "ewim_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$EWIM_CONFIG` env var
/// 2. `./ewim_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub calibration: CalibrationConfig,

    #[serde(default)]
    pub classification: ClassificationConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Default boundaries keyed by indicator config key (`rop`, `hook_load`, ...)
    #[serde(default)]
    pub indicators: BTreeMap<String, IndicatorDefaults>,
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$EWIM_CONFIG` environment variable
    /// 2. `./ewim_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded engine config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./ewim_config.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded engine config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        for w in super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Engine config saved");
        Ok(())
    }

    /// Built-in boundary table with every `[indicators.*]` entry applied.
    /// Unknown indicator keys are skipped here and reported by `validate()`.
    pub fn default_boundaries(&self) -> BoundarySet {
        let mut set = BoundarySet::builtin_defaults();
        for (key, entry) in &self.indicators {
            if let Some(indicator) = Indicator::from_config_key(key) {
                set.insert(indicator, entry.boundary());
            }
        }
        set
    }

    /// Validate all values for internal consistency.
    ///
    /// Rules:
    /// - Capture duration (and tick limit, when set) must be positive
    /// - Floor multipliers must be finite, positive, green <= yellow
    /// - History capacity must be > 0
    /// - Indicator keys must name a known indicator
    /// - Indicator limits must be finite and escalate in their direction
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if !(1..=MAX_CAPTURE_SECS).contains(&self.capture.duration_secs) {
            errors.push(format!(
                "capture.duration_secs: must be between 1 and {MAX_CAPTURE_SECS} (got {})",
                self.capture.duration_secs
            ));
        }
        if self.capture.max_ticks == Some(0) {
            errors.push("capture.max_ticks: must be > 0 when set".to_string());
        }

        let c = &self.calibration;
        for (name, floor) in [("green_floor", c.green_floor), ("yellow_floor", c.yellow_floor)] {
            if !floor.is_finite() || floor <= 0.0 {
                errors.push(format!("calibration.{name}: must be a positive finite number (got {floor})"));
            }
        }
        if c.green_floor.is_finite() && c.yellow_floor.is_finite() && c.yellow_floor < c.green_floor {
            errors.push(format!(
                "calibration: yellow_floor ({:.3}) must be >= green_floor ({:.3})",
                c.yellow_floor, c.green_floor
            ));
        }

        if self.storage.history_capacity == 0 {
            errors.push("storage.history_capacity: must be > 0".to_string());
        }

        for (key, entry) in &self.indicators {
            let name = format!("indicators.{key}");
            if Indicator::from_config_key(key).is_none() {
                errors.push(format!("{name}: unknown indicator"));
                continue;
            }
            Self::check_escalation(entry, &name, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_escalation(entry: &IndicatorDefaults, name: &str, errors: &mut Vec<String>) {
        let (green, yellow) = (entry.green_max, entry.yellow_max);
        // NaN/Inf comparisons silently pass, catch them explicitly
        if !green.is_finite() || !yellow.is_finite() {
            errors.push(format!(
                "{name}: values must be finite (got green_max={green}, yellow_max={yellow})"
            ));
            return;
        }
        if !entry.boundary().is_well_ordered() {
            let relation = match entry.direction {
                Direction::IncreasingIsWorse => ">=",
                Direction::DecreasingIsWorse => "<=",
            };
            errors.push(format!(
                "{name}: yellow_max ({yellow:.3}) must be {relation} green_max ({green:.3}) for {}",
                entry.direction
            ));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Capture
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Wall-clock length of a baseline capture
    #[serde(default = "default_capture_duration")]
    pub duration_secs: i64,

    /// Stop after this many ticks instead of after `duration_secs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ticks: Option<usize>,
}

fn default_capture_duration() -> i64 {
    60
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { duration_secs: default_capture_duration(), max_ticks: None }
    }
}

impl CaptureConfig {
    pub fn limit(&self) -> Result<CaptureLimit, CaptureError> {
        match self.max_ticks {
            Some(ticks) => Ok(CaptureLimit::Ticks(ticks)),
            None => CaptureLimit::seconds(self.duration_secs),
        }
    }
}

// ============================================================================
// Calibration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub policy: CalibrationPolicy,

    /// StandardDeviation policy: green_max is at least `mean * green_floor`
    #[serde(default = "default_green_floor")]
    pub green_floor: f64,

    /// StandardDeviation policy: yellow_max is at least `mean * yellow_floor`
    #[serde(default = "default_yellow_floor")]
    pub yellow_floor: f64,

    /// Calibrate and apply as soon as a capture completes
    #[serde(default = "default_auto_apply")]
    pub auto_apply: bool,
}

fn default_green_floor() -> f64 {
    DEFAULT_GREEN_FLOOR
}
fn default_yellow_floor() -> f64 {
    DEFAULT_YELLOW_FLOOR
}
fn default_auto_apply() -> bool {
    true
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            policy: CalibrationPolicy::default(),
            green_floor: default_green_floor(),
            yellow_floor: default_yellow_floor(),
            auto_apply: default_auto_apply(),
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default)]
    pub zero_sentinel: ZeroSentinel,
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `dynamic_thresholds.json` and `baseline_history.json`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("Config")
}
fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: default_data_dir(), history_capacity: default_history_capacity() }
    }
}

// ============================================================================
// Indicator Defaults
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDefaults {
    pub green_max: f64,
    pub yellow_max: f64,
    #[serde(default)]
    pub direction: Direction,
}

impl IndicatorDefaults {
    pub fn boundary(&self) -> Boundary {
        Boundary::with_direction(self.green_max, self.yellow_max, self.direction)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.capture.limit(), CaptureLimit::seconds(60));
        assert_eq!(config.capture.limit(), Ok(CaptureLimit::default()));
        assert!(config.calibration.auto_apply);
        assert_eq!(config.storage.history_capacity, 10);
        assert_eq!(config.default_boundaries(), BoundarySet::builtin_defaults());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [calibration]
            policy = "percentile"

            [indicators.hook_load]
            green_max = 300000.0
            yellow_max = 250000.0
            direction = "decreasing"
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.calibration.policy, CalibrationPolicy::Percentile);
        assert_eq!(config.calibration.green_floor, DEFAULT_GREEN_FLOOR);
        assert_eq!(config.capture.duration_secs, 60);

        let boundaries = config.default_boundaries();
        assert_eq!(
            boundaries.get(Indicator::HookLoad),
            Some(&Boundary::decreasing(300_000.0, 250_000.0))
        );
        assert_eq!(boundaries.get(Indicator::Rop), BoundarySet::builtin_defaults().get(Indicator::Rop));
    }

    #[test]
    fn test_tick_limit() {
        let config: EngineConfig = toml::from_str("[capture]\nmax_ticks = 5\n").unwrap();
        assert_eq!(config.capture.limit(), Ok(CaptureLimit::Ticks(5)));
    }

    #[test]
    fn test_huge_capture_duration_fails_validation() {
        let config: EngineConfig = toml::from_str("[capture]\nduration_secs = 9223372036854775807\n").unwrap();
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].starts_with("capture.duration_secs"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert_eq!(config.capture.limit(), Err(CaptureError::InvalidDuration(i64::MAX)));
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = EngineConfig::default();
        config.capture.duration_secs = 0;
        config.calibration.green_floor = 1.5;
        config.calibration.yellow_floor = 1.2;
        config.storage.history_capacity = 0;
        config.indicators.insert(
            "rop".to_string(),
            IndicatorDefaults { green_max: 200.0, yellow_max: 100.0, direction: Direction::IncreasingIsWorse },
        );
        config.indicators.insert(
            "torque".to_string(),
            IndicatorDefaults { green_max: 1.0, yellow_max: 2.0, direction: Direction::IncreasingIsWorse },
        );

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 5, "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("indicators.torque")));
                assert!(errors.iter().any(|e| e.contains("indicators.rop")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_limits_rejected() {
        let mut config = EngineConfig::default();
        config.indicators.insert(
            "wob".to_string(),
            IndicatorDefaults { green_max: f64::NAN, yellow_max: 1.0, direction: Direction::IncreasingIsWorse },
        );
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = EngineConfig::default();
        config.calibration.policy = CalibrationPolicy::StatisticalControl;
        config.classification.zero_sentinel = ZeroSentinel::Disabled;
        config.indicators.insert(
            "mud_weight".to_string(),
            IndicatorDefaults { green_max: 10.5, yellow_max: 11.5, direction: Direction::IncreasingIsWorse },
        );

        let text = config.to_toml().unwrap();
        let parsed: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join(LOCAL_CONFIG_FILE);
        let mut config = EngineConfig::default();
        config.storage.history_capacity = 3;
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.storage.history_capacity, 3);
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[storage]\nhistory_capacity = 0\n").unwrap();
        assert!(matches!(EngineConfig::load_from_file(&path), Err(ConfigError::Validation(_))));

        std::fs::write(&path, "[storage\n").unwrap();
        assert!(matches!(EngineConfig::load_from_file(&path), Err(ConfigError::Parse(..))));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(EngineConfig::load_from_file(&missing), Err(ConfigError::Io(..))));
    }
}
