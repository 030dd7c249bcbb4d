//! Shared test utilities
//!
//! Common helpers used across test modules. Only compiled in test builds.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::invoker::RetryPolicy;
use crate::pipeline::observer::PipelineObserver;
use crate::pipeline::prompts::PromptSet;
use crate::pipeline::state::{CycleRecord, Phase, PipelineState};
use crate::provider::{ProviderError, ProviderRequest, TextProvider};

/// Provider answering through a closure and recording every request.
pub struct FnProvider<F> {
    respond: F,
    calls: Mutex<Vec<ProviderRequest>>,
}

impl<F> FnProvider<F>
where
    F: Fn(&ProviderRequest) -> Result<String, ProviderError> + Send + Sync,
{
    pub fn new(respond: F) -> Arc<Self> {
        Arc::new(Self {
            respond,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<ProviderRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl<F> TextProvider for FnProvider<F>
where
    F: Fn(&ProviderRequest) -> Result<String, ProviderError> + Send + Sync,
{
    fn name(&self) -> &str {
        "fn"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(request.clone());
        (self.respond)(request)
    }
}

/// Which instruction a request was built from, for the prompts below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Mutate,
    Stabilize,
    Recover,
    Analyze,
    Apply,
}

/// Short, recognizable prompts: mutation sees the input, stabilization sees
/// only the mutated material.
pub fn plain_prompts() -> PromptSet {
    PromptSet {
        mutation_system: "mutate".to_string(),
        mutation_template: "{{input}}".to_string(),
        stabilization_system: "stabilize".to_string(),
        stabilization_template: "{{mutated}}".to_string(),
        recovery_system: "recover".to_string(),
        recovery_template: "{{current}}".to_string(),
        analysis_system: "analyze".to_string(),
        apply_system: "apply".to_string(),
        ..PromptSet::default()
    }
}

pub fn step_of(request: &ProviderRequest) -> Step {
    match request.system_prompt.as_deref() {
        Some("mutate") => Step::Mutate,
        Some("stabilize") => Step::Stabilize,
        Some("recover") => Step::Recover,
        Some("analyze") => Step::Analyze,
        Some("apply") => Step::Apply,
        other => panic!("unexpected system prompt: {other:?}"),
    }
}

/// Zero-delay retries so tests never sleep.
pub const fn instant_retries() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    }
}

/// Observer that keeps every phase and history snapshot it sees.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub phases: Vec<Phase>,
    pub records: Vec<CycleRecord>,
    pub snapshots: Vec<Arc<[CycleRecord]>>,
}

impl PipelineObserver for RecordingObserver {
    fn on_phase_change(&mut self, state: &PipelineState) {
        self.phases.push(state.phase);
    }

    fn on_cycle_complete(&mut self, record: &CycleRecord, history: Arc<[CycleRecord]>) {
        self.records.push(record.clone());
        self.snapshots.push(history);
    }
}
