//! Boundary Store - persisted active boundary set
//!
//! Loading never fails from the caller's point of view: a missing, corrupt or
//! incompatible file yields the default set and a warning. [`BoundaryStore::try_load`]
//! exposes the reason for callers that want to report it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{write_json_atomic, StoreError};
use crate::baseline::BaselineSummary;
use crate::boundary::BoundarySet;

pub const THRESHOLDS_FILE: &str = "dynamic_thresholds.json";

/// Written into every file. Files with a different major version are ignored.
pub const THRESHOLDS_VERSION: &str = "1.0";

/// Suffix format of `dynamic_thresholds.json.backup.<stamp>`.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// On-disk layout of `dynamic_thresholds.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdDocument {
    #[serde(alias = "last_updated")]
    pub last_updated: DateTime<Utc>,
    pub version: String,
    pub thresholds: BoundarySet,
    /// Baseline the thresholds were calibrated from, if any
    #[serde(default, alias = "baseline_data", skip_serializing_if = "Option::is_none")]
    pub baseline_data: Option<BaselineSummary>,
}

fn major_version(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

#[derive(Debug, Clone)]
pub struct BoundaryStore {
    path: PathBuf,
    defaults: BoundarySet,
}

impl BoundaryStore {
    /// Store rooted at `data_dir`, falling back to `defaults`.
    pub fn new(data_dir: impl AsRef<Path>, defaults: BoundarySet) -> Self {
        Self { path: data_dir.as_ref().join(THRESHOLDS_FILE), defaults }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn defaults(&self) -> &BoundarySet {
        &self.defaults
    }

    /// Read the persisted document.
    pub fn try_load_document(&self) -> Result<ThresholdDocument, StoreError> {
        let unavailable = |reason: String| StoreError::ConfigurationUnavailable { path: self.path.clone(), reason };

        let json = std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => unavailable("file not found".to_string()),
            _ => unavailable(format!("unreadable: {e}")),
        })?;

        let doc: ThresholdDocument =
            serde_json::from_str(&json).map_err(|e| unavailable(format!("corrupt: {e}")))?;

        if major_version(&doc.version) != major_version(THRESHOLDS_VERSION) {
            return Err(unavailable(format!(
                "incompatible version {} (expected {})",
                doc.version, THRESHOLDS_VERSION
            )));
        }

        Ok(doc)
    }

    /// Persisted boundaries, or the reason they cannot be used.
    pub fn try_load(&self) -> Result<BoundarySet, StoreError> {
        self.try_load_document().map(|doc| doc.thresholds)
    }

    /// Persisted boundaries, or the defaults.
    pub fn load(&self) -> BoundarySet {
        match self.try_load() {
            Ok(set) => {
                info!(path = %self.path.display(), indicators = set.len(), "Loaded persisted boundaries");
                set
            }
            Err(StoreError::ConfigurationUnavailable { reason, .. }) if reason == "file not found" => {
                info!(path = %self.path.display(), "No persisted boundaries, using defaults");
                self.defaults.clone()
            }
            Err(e) => {
                warn!(error = %e, "Persisted boundaries unavailable, using defaults");
                self.defaults.clone()
            }
        }
    }

    /// Atomically replace the persisted boundaries.
    pub fn save(&self, boundaries: &BoundarySet, baseline: Option<&BaselineSummary>) -> Result<(), StoreError> {
        let doc = ThresholdDocument {
            last_updated: Utc::now(),
            version: THRESHOLDS_VERSION.to_string(),
            thresholds: boundaries.clone(),
            baseline_data: baseline.cloned(),
        };
        write_json_atomic(&self.path, &doc)?;

        info!(
            path = %self.path.display(),
            indicators = boundaries.len(),
            with_baseline = baseline.is_some(),
            "Boundaries saved"
        );
        Ok(())
    }

    /// Copy the current file to a timestamped backup next to it.
    ///
    /// Returns the backup path, or `None` when there was nothing to back up.
    pub fn backup_current(&self) -> Result<Option<PathBuf>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let stamp = Utc::now().format(BACKUP_TIMESTAMP_FORMAT);
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".backup.{stamp}"));
        let backup = PathBuf::from(name);

        std::fs::copy(&self.path, &backup)
            .map_err(|source| StoreError::BackupFailed { path: self.path.clone(), source })?;

        info!(backup = %backup.display(), "Backed up boundary file");
        Ok(Some(backup))
    }

    /// Back up the current file, then persist and return the defaults.
    /// A failed backup leaves the file untouched.
    pub fn reset_to_defaults(&self) -> Result<BoundarySet, StoreError> {
        self.backup_current()?;
        self.save(&self.defaults, None)?;
        warn!(path = %self.path.display(), "Boundaries reset to defaults");
        Ok(self.defaults.clone())
    }
}
