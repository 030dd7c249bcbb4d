//! Append-only audit trail of completed cycles
//!
//! Every [`CycleRecord`] is written as one JSON line to
//! `.transmute/history.jsonl`, stamped with the start time of the run that
//! produced it. Nothing reads it back into a pipeline; it is there for
//! inspection and offline analysis.

use std::fs::{self, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::state::CycleRecord;

/// File name inside the log directory.
pub const HISTORY_FILE: &str = "history.jsonl";

/// One line of the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Start of the run this cycle belongs to; cycle numbers restart per run
    pub run_started_at: DateTime<Utc>,
    /// The completed cycle
    #[serde(flatten)]
    pub record: CycleRecord,
}

/// JSONL writer/reader for cycle records.
pub struct HistoryLog {
    log_path: PathBuf,
    run_started_at: DateTime<Utc>,
}

impl HistoryLog {
    /// Open the log under `log_dir` for a run starting now, creating the
    /// directory if needed.
    ///
    /// # Errors
    /// Returns an error if the log directory cannot be created
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self> {
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

        Ok(Self {
            log_path: log_dir.join(HISTORY_FILE),
            run_started_at: Utc::now(),
        })
    }

    /// Stamp appended lines with `started_at` instead of the open time.
    #[must_use]
    pub fn with_run_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.run_started_at = started_at;
        self
    }

    /// Start time written with every appended record.
    #[must_use]
    pub fn run_started_at(&self) -> DateTime<Utc> {
        self.run_started_at
    }

    /// Append one record as a JSON line.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or written
    pub fn append(&self, record: &CycleRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open log file: {}", self.log_path.display()))?;

        let entry = HistoryEntry {
            run_started_at: self.run_started_at,
            record: record.clone(),
        };
        let json = serde_json::to_string(&entry).context("Failed to serialize cycle record")?;
        writeln!(file, "{json}").context("Failed to write to log file")?;

        Ok(())
    }

    /// Every entry in the log, oldest first, across all runs. A missing file
    /// is an empty log.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or a line is not an entry
    pub fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.log_path)
            .with_context(|| format!("Failed to read log file: {}", self.log_path.display()))?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("Failed to parse line {} as JSON", index + 1))
            })
            .collect()
    }

    /// Records written by this log's own run, oldest first.
    ///
    /// # Errors
    /// Same as [`Self::read_all`]
    pub fn read_run(&self) -> Result<Vec<CycleRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|entry| entry.run_started_at == self.run_started_at)
            .map(|entry| entry.record)
            .collect())
    }

    /// Path of the JSONL file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}
