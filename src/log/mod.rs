//! Run logging
//!
//! Two on-disk artifacts under the log directory (`.transmute` by default):
//! an append-only JSONL history of completed cycles, and a progress snapshot
//! rewritten on every phase change.

pub mod history;
pub mod progress;

pub use history::{HistoryEntry, HistoryLog};
pub use progress::{ProgressWriter, RunProgress};
