//! Config Validation Tests
//!
//! Typo detection and consistency checks of the engine config, exercised
//! independently from the monitor.

use ewim::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use ewim::config::{ConfigError, EngineConfig};
use ewim::{Boundary, CalibrationPolicy, Direction, Indicator, ZeroSentinel};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_capture_section_warns_with_suggestion() {
    let toml_str = r#"
[capture]
duraton_secs = 90
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("duraton_secs"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("capture.duration_secs"));
}

#[test]
fn typo_in_indicator_field_warns() {
    let toml_str = r#"
[indicators.rop]
green_max = 100.0
yelow_max = 200.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("indicators.rop.yellow_max"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[capture]
duration_secs = 120

[calibration]
policy = "statistical_control"
green_floor = 1.05
yellow_floor = 1.15
auto_apply = false

[classification]
zero_sentinel = "disabled"

[storage]
data_dir = "/var/lib/ewim"
history_capacity = 20

[indicators.hook_load]
green_max = 300000.0
yellow_max = 250000.0
direction = "decreasing"
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());

    let config: EngineConfig = toml::from_str(toml_str).expect("parses");
    config.validate().expect("valid");
    assert_eq!(config.calibration.policy, CalibrationPolicy::StatisticalControl);
    assert_eq!(config.classification.zero_sentinel, ZeroSentinel::Disabled);
    assert_eq!(
        config.default_boundaries().get(Indicator::HookLoad),
        Some(&Boundary::with_direction(300_000.0, 250_000.0, Direction::DecreasingIsWorse))
    );
}

#[test]
fn every_indicator_has_known_keys() {
    let known = known_config_keys();
    for indicator in Indicator::ALL {
        let key = format!("indicators.{}.green_max", indicator.config_key());
        assert!(known.contains(&key), "{key} missing");
    }
}

#[test]
fn far_off_key_gets_no_suggestion() {
    let known = known_config_keys();
    assert_eq!(suggest_correction("completely_unrelated_section", &known), None);
}

// ============================================================================
// Consistency Checks
// ============================================================================

#[test]
fn decreasing_indicator_with_increasing_limits_fails() {
    let toml_str = r#"
[indicators.mud_weight]
green_max = 9.0
yellow_max = 10.0
direction = "decreasing_is_worse"
"#;
    let config: EngineConfig = toml::from_str(toml_str).expect("parses");
    match config.validate() {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("indicators.mud_weight"));
            assert!(errors[0].contains("decreasing-is-worse"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn validation_error_display_lists_every_problem() {
    let toml_str = r#"
[capture]
duration_secs = -5

[storage]
history_capacity = 0
"#;
    let config: EngineConfig = toml::from_str(toml_str).expect("parses");
    let err = config.validate().expect_err("invalid");
    let text = err.to_string();
    assert!(text.starts_with("Config validation failed:"));
    assert!(text.contains("capture.duration_secs"));
    assert!(text.contains("storage.history_capacity"));
}

#[test]
fn unknown_policy_is_a_parse_error() {
    let result: Result<EngineConfig, _> = toml::from_str("[calibration]\npolicy = \"median\"\n");
    assert!(result.is_err());
}
