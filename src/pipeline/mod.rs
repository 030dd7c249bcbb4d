//! Pipelines
//!
//! - [`transmute`]: the N-cycle mutate → stabilize loop
//! - [`refactor`]: single-shot analyze → apply
//!
//! Both build their requests from a shared [`prompts::PromptSet`].

pub mod observer;
pub mod prompts;
pub mod refactor;
pub mod state;
pub mod summary;
pub mod text;
pub mod transmute;

pub use observer::{CancelFlag, NoopObserver, PipelineObserver};
pub use prompts::{PromptOverrides, PromptSet};
pub use refactor::{RefactorAnalysis, RefactorIssue, RefactorPipeline, RefactorReport};
pub use state::{CycleRecord, Phase, PipelineState};
pub use summary::{RunSummary, Trend};
pub use transmute::{TransmuteOptions, TransmutePipeline};
