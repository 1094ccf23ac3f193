//! Config validation: unknown-key detection with Levenshtein suggestions
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use crate::types::Indicator;

/// A non-fatal config warning (typo, misplaced key).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

const INDICATOR_FIELDS: [&str; 3] = ["green_max", "yellow_max", "direction"];

/// Every valid dotted key path of `EngineConfig`.
///
/// Maintained by hand to match engine_config.rs. Indicator sections are
/// generated from [`Indicator::ALL`].
pub fn known_config_keys() -> HashSet<String> {
    let fixed: &[&str] = &[
        // [capture]
        "capture",
        "capture.duration_secs",
        "capture.max_ticks",
        // [calibration]
        "calibration",
        "calibration.policy",
        "calibration.green_floor",
        "calibration.yellow_floor",
        "calibration.auto_apply",
        // [classification]
        "classification",
        "classification.zero_sentinel",
        // [storage]
        "storage",
        "storage.data_dir",
        "storage.history_capacity",
        // [indicators]
        "indicators",
    ];

    let mut keys: HashSet<String> = fixed.iter().map(|k| (*k).to_string()).collect();
    for indicator in Indicator::ALL {
        let section = format!("indicators.{}", indicator.config_key());
        for field in INDICATOR_FIELDS {
            keys.insert(format!("{section}.{field}"));
        }
        keys.insert(section);
    }
    keys
}

/// Collect dotted key paths from a TOML value tree.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Closest known key within edit distance 3. Ties go to the
/// lexicographically smallest key so the suggestion is stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<String>) -> Option<String> {
    known
        .iter()
        .map(|k| (levenshtein(unknown, k), k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.clone())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; unknown indicator sections are
/// rejected later by `EngineConfig::validate`.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_clean_config_has_no_warnings() {
        let raw = r#"
            [capture]
            duration_secs = 120

            [indicators.rop]
            green_max = 100.0
            yellow_max = 200.0
        "#;
        assert!(validate_unknown_keys(raw).is_empty());
    }

    #[test]
    fn test_typo_gets_suggestion() {
        let raw = "[calibration]\nauto_aply = false\n";
        let warnings = validate_unknown_keys(raw);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "calibration.auto_aply");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("calibration.auto_apply"));
    }

    #[test]
    fn test_unknown_indicator_section_flagged() {
        let raw = "[indicators.torque]\ngreen_max = 1.0\nyellow_max = 2.0\n";
        let fields: Vec<String> = validate_unknown_keys(raw).into_iter().map(|w| w.field).collect();
        assert!(fields.contains(&"indicators.torque".to_string()));
        assert!(fields.contains(&"indicators.torque.green_max".to_string()));
    }

    #[test]
    fn test_unparseable_toml_yields_no_warnings() {
        assert!(validate_unknown_keys("[capture").is_empty());
    }
}
