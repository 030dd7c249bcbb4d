//! Observer wiring the pipeline to the terminal and the log directory

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::display::RunDisplay;
use crate::log::{HistoryLog, ProgressWriter, RunProgress};
use crate::pipeline::observer::PipelineObserver;
use crate::pipeline::state::{CycleRecord, PipelineState};

/// Renders progress and mirrors it to `history.jsonl` / `progress.json`.
///
/// Log failures never stop a run; they are reported with `warn!` and skipped.
pub struct CliObserver {
    display: RunDisplay,
    history: Option<HistoryLog>,
    progress: Option<ProgressWriter>,
    started_at: DateTime<Utc>,
}

impl CliObserver {
    /// Terminal-only observer.
    #[must_use]
    pub fn new(display: RunDisplay) -> Self {
        Self {
            display,
            history: None,
            progress: None,
            started_at: Utc::now(),
        }
    }

    /// Also write the audit log and progress file. The progress file takes
    /// its start time from the history log's run marker.
    #[must_use]
    pub fn with_logs(mut self, history: HistoryLog, progress: ProgressWriter) -> Self {
        self.started_at = history.run_started_at();
        self.history = Some(history);
        self.progress = Some(progress);
        self
    }
}

impl PipelineObserver for CliObserver {
    fn on_phase_change(&mut self, state: &PipelineState) {
        self.display.render_phase(state);

        if let Some(writer) = &self.progress {
            if let Err(e) = writer.write(&RunProgress::from_state(self.started_at, state)) {
                warn!(error = %e, "failed to write progress file");
            }
        }
    }

    fn on_cycle_complete(&mut self, record: &CycleRecord, _history: Arc<[CycleRecord]>) {
        self.display.render_cycle(record);

        if let Some(log) = &self.history {
            if let Err(e) = log.append(record) {
                warn!(error = %e, cycle = record.cycle_number, "failed to append history");
            }
        }
    }
}
