//! Progress hooks and cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::state::{CycleRecord, PipelineState};

/// Receives progress from a running pipeline.
///
/// Hooks are synchronous and fire-and-forget. They get read-only snapshots;
/// nothing they do can reach back into the run.
pub trait PipelineObserver {
    /// Called at start, at every phase transition and at the end.
    fn on_phase_change(&mut self, _state: &PipelineState) {}

    /// Called once per completed cycle with the history up to and including it.
    fn on_cycle_complete(&mut self, _record: &CycleRecord, _history: Arc<[CycleRecord]>) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Shared cancellation flag for one run.
///
/// The caller keeps a clone and flips it from outside the run; the pipeline
/// polls it at checkpoints. Create a fresh flag for every run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A new, un-cancelled flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
