//! Progress file for external observability
//!
//! Manages `.transmute/progress.json`, a single JSON file reflecting the
//! current state of a run. External tools can poll it instead of parsing the
//! terminal output or the history log.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::state::{CycleRecord, Phase, PipelineState};

/// Snapshot of a run, written to `.transmute/progress.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Current phase
    pub phase: Phase,
    /// Cycle in progress (0 before the first)
    pub current_cycle: u32,
    /// Cycles requested
    pub total_cycles: u32,
    /// Cycles recorded so far
    pub cycles_completed: u32,
    /// RSI of the last completed cycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_rsi: Option<f64>,
    /// Terminal error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunProgress {
    /// Progress for a run that started at `started_at`, as of `state`.
    #[must_use]
    pub fn from_state(started_at: DateTime<Utc>, state: &PipelineState) -> Self {
        Self {
            started_at,
            phase: state.phase,
            current_cycle: state.current_cycle,
            total_cycles: state.total_cycles,
            cycles_completed: u32::try_from(state.history.len()).unwrap_or(u32::MAX),
            last_rsi: state.last_record().map(CycleRecord::rsi),
            error: state.error.clone(),
        }
    }
}

/// Reads and writes `.transmute/progress.json`
pub struct ProgressWriter {
    path: PathBuf,
}

impl ProgressWriter {
    /// Create a writer targeting `<log_dir>/progress.json`.
    ///
    /// # Errors
    /// Returns an error if the log directory cannot be created
    pub fn new(log_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
        Ok(Self {
            path: log_dir.join("progress.json"),
        })
    }

    /// Atomically write progress (write to temp, then rename).
    ///
    /// # Errors
    /// Returns an error if the temp file cannot be written or renamed
    pub fn write(&self, progress: &RunProgress) -> Result<()> {
        let json =
            serde_json::to_string_pretty(progress).context("Failed to serialize progress")?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json.as_bytes())
            .with_context(|| format!("Failed to write temp file: {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} -> {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;
        Ok(())
    }

    /// Current progress, or `None` if no file was written yet.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn read(&self) -> Result<Option<RunProgress>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let progress = serde_json::from_str(&content).context("Failed to parse progress.json")?;
        Ok(Some(progress))
    }

    /// Path of the progress file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
