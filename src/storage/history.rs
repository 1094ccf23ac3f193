//! Baseline history - bounded FIFO of past baselines
//!
//! Only derived statistics are kept, never the raw sample streams.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{write_json_atomic, StoreError};
use crate::baseline::BaselineSummary;

pub const HISTORY_FILE: &str = "baseline_history.json";

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct BaselineHistory {
    path: PathBuf,
    capacity: usize,
}

impl BaselineHistory {
    pub fn new(data_dir: impl AsRef<Path>, capacity: usize) -> Self {
        Self { path: data_dir.as_ref().join(HISTORY_FILE), capacity: capacity.max(1) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stored baselines, oldest first. Empty when the file is missing or
    /// cannot be read.
    pub fn history(&self) -> Vec<BaselineSummary> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(j) => j,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No baseline history file");
                return Vec::new();
            }
        };

        match serde_json::from_str(&json) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt baseline history, ignoring");
                Vec::new()
            }
        }
    }

    /// Append `summary`, evicting the oldest entries beyond capacity.
    /// Returns the number of stored baselines.
    pub fn append(&self, summary: &BaselineSummary) -> Result<usize, StoreError> {
        let mut entries = self.history();
        entries.push(summary.clone());

        let excess = entries.len().saturating_sub(self.capacity);
        if excess > 0 {
            entries.drain(..excess);
            debug!(evicted = excess, "Evicted oldest baselines");
        }

        write_json_atomic(&self.path, &entries)?;
        info!(
            entries = entries.len(),
            capacity = self.capacity,
            samples = summary.sample_count,
            "Baseline appended to history"
        );
        Ok(entries.len())
    }
}
