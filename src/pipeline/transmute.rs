//! Transmutation pipeline
//!
//! Runs N cycles of mutate → stabilize against a text provider. Each cycle
//! diverges from the current text at high temperature, then reconciles the
//! divergence back against the immutable source at low temperature. Blank
//! output is compensated so the run always has material to work with.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::observer::PipelineObserver;
use super::prompts::PromptSet;
use super::state::{CycleRecord, Phase, PipelineState};
use super::text::{is_blank, reverse_lines, strip_code_fences};
use crate::config::{PipelineConfig, TransmuteConfig};
use crate::invoker::{ResilientInvoker, RetryPolicy};
use crate::metrics::CycleMetrics;
use crate::provider::{ProviderError, ProviderRequest, TextProvider};

/// Temperature of the emergency recovery call.
pub const RECOVERY_TEMPERATURE: f32 = 0.1;

/// Cycle count and phase temperatures for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmuteOptions {
    /// Number of mutate/stabilize cycles
    pub cycles: u32,
    /// Mutation temperature
    pub mutate_temperature: f32,
    /// Stabilization temperature
    pub stabilize_temperature: f32,
}

impl From<&PipelineConfig> for TransmuteOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            cycles: config.cycles,
            mutate_temperature: config.mutate_temperature,
            stabilize_temperature: config.stabilize_temperature,
        }
    }
}

/// How a single cycle ended.
enum CycleOutcome {
    Recorded,
    Cancelled,
}

/// The mutate/stabilize orchestrator.
pub struct TransmutePipeline {
    provider: Arc<dyn TextProvider>,
    invoker: ResilientInvoker,
    prompts: PromptSet,
    options: TransmuteOptions,
}

impl TransmutePipeline {
    /// Pipeline with default prompts and retry policy.
    #[must_use]
    pub fn new(provider: Arc<dyn TextProvider>, options: TransmuteOptions) -> Self {
        Self {
            provider,
            invoker: ResilientInvoker::default(),
            prompts: PromptSet::default(),
            options,
        }
    }

    /// Pipeline configured from transmute.toml.
    #[must_use]
    pub fn from_config(provider: Arc<dyn TextProvider>, config: &TransmuteConfig) -> Self {
        Self::new(provider, TransmuteOptions::from(&config.pipeline))
            .with_retry_policy(config.retry.policy())
            .with_prompts(PromptSet::with_overrides(&config.prompts))
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.invoker = ResilientInvoker::new(policy);
        self
    }

    /// Replace the instruction templates.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Options this pipeline runs with.
    #[must_use]
    pub const fn options(&self) -> &TransmuteOptions {
        &self.options
    }

    /// Run the full transmutation over `source_text`.
    ///
    /// Never returns an error: a terminal provider failure ends the run in
    /// [`Phase::Error`] with the message in `state.error`, and cancellation ends
    /// it in [`Phase::Idle`]. The returned state keeps every completed cycle.
    pub async fn run<O, C>(&self, source_text: &str, observer: &mut O, is_cancelled: C) -> PipelineState
    where
        O: PipelineObserver + ?Sized,
        C: Fn() -> bool,
    {
        let mut state = PipelineState::new(source_text, self.options.cycles);
        observer.on_phase_change(&state);

        if is_blank(source_text) {
            state.phase = Phase::Error;
            state.error = Some("Source text is empty".to_string());
            observer.on_phase_change(&state);
            return state;
        }

        info!(
            provider = self.provider.name(),
            cycles = self.options.cycles,
            "starting transmutation"
        );

        let outcome = self.run_cycles(&mut state, observer, &is_cancelled).await;
        state.current_text = state.settled_text().to_string();

        match outcome {
            Ok(()) if is_cancelled() => {
                info!(completed = state.history.len(), "transmutation cancelled");
                state.phase = Phase::Idle;
            }
            Ok(()) => {
                info!(completed = state.history.len(), "transmutation complete");
                state.phase = Phase::Complete;
            }
            Err(err) => {
                error!(cycle = state.current_cycle, status = ?err.status(), error = %err, "transmutation failed");
                state.phase = Phase::Error;
                state.error = Some(err.to_string());
            }
        }

        observer.on_phase_change(&state);
        state
    }

    async fn run_cycles<O>(
        &self,
        state: &mut PipelineState,
        observer: &mut O,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<(), ProviderError>
    where
        O: PipelineObserver + ?Sized,
    {
        for cycle in 1..=state.total_cycles {
            if is_cancelled() {
                debug!(cycle, "cancelled before cycle start");
                break;
            }

            state.current_cycle = cycle;
            match self.run_cycle(state, observer, is_cancelled).await? {
                CycleOutcome::Recorded => {}
                CycleOutcome::Cancelled => break,
            }
        }
        Ok(())
    }

    async fn run_cycle<O>(
        &self,
        state: &mut PipelineState,
        observer: &mut O,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<CycleOutcome, ProviderError>
    where
        O: PipelineObserver + ?Sized,
    {
        let cycle = state.current_cycle;

        // Mutate
        state.phase = Phase::Mutate;
        observer.on_phase_change(state);

        let request = self
            .prompts
            .mutation(&state.current_text, self.options.mutate_temperature);
        let raw = self.call(&request, is_cancelled).await?;
        if is_cancelled() {
            debug!(cycle, "cancelled after mutation");
            return Ok(CycleOutcome::Cancelled);
        }

        let mutated = if is_blank(&raw) {
            warn!(cycle, "mutation came back blank, reversing input lines");
            reverse_lines(&state.current_text)
        } else {
            raw
        };

        // Stabilize
        state.phase = Phase::Stabilize;
        observer.on_phase_change(state);

        let request = self.prompts.stabilization(
            &state.source_text,
            &mutated,
            self.options.stabilize_temperature,
        );
        let raw = self.call(&request, is_cancelled).await?;
        if is_cancelled() {
            debug!(cycle, "cancelled after stabilization");
            return Ok(CycleOutcome::Cancelled);
        }

        let mut stabilized = strip_code_fences(&raw);
        if is_blank(&stabilized) {
            stabilized = self.recover(&state.current_text, cycle, is_cancelled).await;
            if is_cancelled() {
                debug!(cycle, "cancelled during recovery");
                return Ok(CycleOutcome::Cancelled);
            }
        }

        // Record
        let record = CycleRecord {
            cycle_number: cycle,
            metrics: CycleMetrics::compute(&mutated, &stabilized),
            mutated_text: mutated,
            stabilized_text: stabilized,
            timestamp: Utc::now().timestamp_millis(),
        };
        info!(
            cycle,
            rsi = record.rsi(),
            convergence = record.metrics.convergence,
            delta_lines = record.metrics.delta_lines,
            "cycle complete"
        );

        state.record(record.clone());
        observer.on_cycle_complete(&record, Arc::clone(&state.history));

        Ok(CycleOutcome::Recorded)
    }

    /// One emergency call to restore `current`; falls back to `current` itself.
    async fn recover(&self, current: &str, cycle: u32, is_cancelled: &dyn Fn() -> bool) -> String {
        warn!(cycle, "stabilization came back blank, attempting recovery");

        let request = self.prompts.recovery(current, RECOVERY_TEMPERATURE);
        match self.call(&request, is_cancelled).await {
            Ok(text) => {
                let restored = strip_code_fences(&text);
                if !is_blank(&restored) {
                    return restored;
                }
                warn!(cycle, "recovery came back blank, keeping previous text");
            }
            Err(err) => {
                warn!(cycle, error = %err, "recovery failed, keeping previous text");
            }
        }

        current.to_string()
    }

    async fn call(
        &self,
        request: &ProviderRequest,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<String, ProviderError> {
        self.invoker
            .invoke(|| self.provider.generate_text(request), is_cancelled)
            .await
    }
}
