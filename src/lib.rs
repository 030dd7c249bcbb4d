//! Transmute - mutate/stabilize text pipeline
//!
//! Transmute drives a text through repeated cycles of high-temperature
//! mutation and low-temperature stabilization against a pluggable
//! generative-text backend. Stabilization always re-anchors on the original
//! source, and every cycle is scored by a deterministic metrics engine.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

pub mod cli;
pub mod config;
pub mod invoker;
pub mod log;
pub mod metrics;
pub mod pipeline;
pub mod provider;

#[cfg(test)]
mod testutil;

// Re-export commonly used types
pub use config::{ProviderConfig, ProviderKind, TransmuteConfig};
pub use invoker::{ResilientInvoker, RetryPolicy};
pub use log::{HistoryEntry, HistoryLog, ProgressWriter, RunProgress};
pub use metrics::CycleMetrics;
pub use pipeline::{
    CancelFlag, CycleRecord, Phase, PipelineObserver, PipelineState, RefactorPipeline,
    RefactorReport, RunSummary, TransmutePipeline,
};
pub use provider::{build_provider, ProviderError, ProviderRequest, TextProvider};
