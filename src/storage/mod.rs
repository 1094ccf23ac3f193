//! Durable storage for boundaries and baseline history
//!
//! Both files are plain pretty-printed JSON under the configured data
//! directory:
//!
//! - `dynamic_thresholds.json`: the active boundary set, see [`BoundaryStore`]
//! - `baseline_history.json`: the last N baselines, see [`BaselineHistory`]
//!
//! Writes go to a sibling `.tmp` file which is then renamed over the target,
//! so a crash mid-write leaves the previous file intact.

pub mod boundary_store;
pub mod history;

pub use boundary_store::{BoundaryStore, ThresholdDocument, BACKUP_TIMESTAMP_FORMAT, THRESHOLDS_FILE, THRESHOLDS_VERSION};
pub use history::{BaselineHistory, DEFAULT_HISTORY_CAPACITY, HISTORY_FILE};

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Persisted boundaries could not be used; callers fall back to defaults.
    #[error("Configuration unavailable at {path}: {reason}")]
    ConfigurationUnavailable { path: PathBuf, reason: String },

    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to back up {path}: {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serialize `value` and atomically replace `path` with it.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let write_failed = |source| StoreError::WriteFailed { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_failed)?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json).map_err(write_failed)?;
    std::fs::rename(&tmp_path, path).map_err(write_failed)?;

    debug!(path = %path.display(), "Wrote file atomically");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_creates_parent_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().expect("tmpdir");
        let path = dir.path().join("nested").join("out.json");

        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();

        let loaded: Vec<i32> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, vec![1, 2, 3]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_atomic_write_failure_is_reported() {
        let dir = tempfile::tempdir().expect("tmpdir");
        // a regular file where the parent directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let err = write_json_atomic(&blocker.join("out.json"), &1).unwrap_err();
        assert!(matches!(err, StoreError::WriteFailed { .. }));
    }
}
