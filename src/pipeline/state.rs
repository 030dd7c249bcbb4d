//! Pipeline state and cycle history

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::metrics::CycleMetrics;

/// Where a transmutation run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Not running: before start, or after a cancelled run
    Idle,
    /// High-temperature divergence step
    Mutate,
    /// Low-temperature reconciliation step
    Stabilize,
    /// All requested cycles finished
    Complete,
    /// Stopped by a terminal provider error
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Mutate => "mutate",
            Self::Stabilize => "stabilize",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

/// One completed mutate/stabilize pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// 1-based cycle number
    pub cycle_number: u32,
    /// Output of the mutation phase (or its fallback)
    pub mutated_text: String,
    /// Output of the stabilization phase (or its recovery)
    pub stabilized_text: String,
    /// Completion time, epoch milliseconds
    pub timestamp: i64,
    /// Scores for this cycle
    pub metrics: CycleMetrics,
}

impl CycleRecord {
    /// Composite index for this cycle.
    #[must_use]
    pub fn rsi(&self) -> f64 {
        self.metrics.rsi()
    }
}

/// State of one run.
///
/// `history` is a shared immutable snapshot: appending builds a new slice, so
/// any snapshot already handed to an observer never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    /// Current phase
    pub phase: Phase,
    /// Cycle currently (or last) in progress, 0 before the first
    pub current_cycle: u32,
    /// Cycles requested
    pub total_cycles: u32,
    /// Immutable anchor supplied at start
    pub source_text: String,
    /// Latest stabilized text; input to the next mutation
    pub current_text: String,
    /// Completed cycles in order
    pub history: Arc<[CycleRecord]>,
    /// Terminal error message, verbatim
    pub error: Option<String>,
}

impl PipelineState {
    /// Initial state for a run over `source_text`.
    #[must_use]
    pub fn new(source_text: &str, total_cycles: u32) -> Self {
        Self {
            phase: Phase::Idle,
            current_cycle: 0,
            total_cycles,
            source_text: source_text.to_string(),
            current_text: source_text.to_string(),
            history: Arc::from(Vec::new()),
            error: None,
        }
    }

    /// Append a completed cycle and advance `current_text` to its output.
    pub fn record(&mut self, record: CycleRecord) {
        let mut next = self.history.to_vec();
        self.current_text.clone_from(&record.stabilized_text);
        next.push(record);
        self.history = Arc::from(next);
    }

    /// The most recent record, if any cycle completed.
    #[must_use]
    pub fn last_record(&self) -> Option<&CycleRecord> {
        self.history.last()
    }

    /// Last stabilized text, or the source when nothing completed.
    #[must_use]
    pub fn settled_text(&self) -> &str {
        self.last_record()
            .map_or(self.source_text.as_str(), |r| r.stabilized_text.as_str())
    }

    /// True once the run has stopped, for whatever reason.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Complete | Phase::Error)
    }
}
