//! CLI output formatting
//!
//! Human-readable, colored terminal output for runs and refactor reports,
//! plus the observer that connects a running pipeline to it.

pub mod display;
pub mod observer;

pub use display::{render_refactor_report, render_run_summary, RsiColor, RunDisplay};
pub use observer::CliObserver;
