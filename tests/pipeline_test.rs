#![allow(missing_docs)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use transmute::pipeline::{NoopObserver, PromptSet, TransmuteOptions};
use transmute::{
    CancelFlag, Phase, ProviderError, ProviderRequest, RetryPolicy, TextProvider,
    TransmutePipeline,
};

/// Prefixes mutation output with `MUT:` and stabilization output with `STB:`.
/// Mutation runs hot, so the phase is told apart by temperature.
struct EchoProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl TextProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prefix = if request.temperature > 1.0 { "MUT:" } else { "STB:" };
        Ok(format!("{prefix}{}", request.user_prompt))
    }
}

/// Always rate-limited.
struct RateLimitedProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl TextProvider for RateLimitedProvider {
    fn name(&self) -> &str {
        "rate-limited"
    }

    async fn generate_text(&self, _request: &ProviderRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::with_status(429, "Too Many Requests"))
    }
}

/// Returns nothing for mutation, echoes for stabilization.
struct SilentMutator;

#[async_trait]
impl TextProvider for SilentMutator {
    fn name(&self) -> &str {
        "silent"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        if request.temperature > 1.0 {
            Ok("  \n".to_string())
        } else {
            Ok(request.user_prompt.clone())
        }
    }
}

fn options(cycles: u32) -> TransmuteOptions {
    TransmuteOptions {
        cycles,
        mutate_temperature: 1.2,
        stabilize_temperature: 0.2,
    }
}

/// Prompts that pass the relevant text through untouched.
fn passthrough_prompts() -> PromptSet {
    PromptSet {
        mutation_template: "{{input}}".to_string(),
        stabilization_template: "{{mutated}}".to_string(),
        ..PromptSet::default()
    }
}

fn no_wait() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    }
}

fn echo() -> Arc<EchoProvider> {
    Arc::new(EchoProvider {
        calls: AtomicUsize::new(0),
    })
}

/// Two cycles of the echo provider chain each output into the next input.
#[tokio::test]
async fn test_echo_provider_two_cycles() {
    let pipeline = TransmutePipeline::new(echo(), options(2)).with_prompts(passthrough_prompts());

    let state = pipeline
        .run("def f(): pass", &mut NoopObserver, || false)
        .await;

    assert_eq!(state.phase, Phase::Complete);
    assert_eq!(state.history.len(), 2);
    assert_eq!(state.history[0].mutated_text, "MUT:def f(): pass");
    assert_eq!(state.history[0].stabilized_text, "STB:MUT:def f(): pass");
    assert_eq!(state.history[1].mutated_text, "MUT:STB:MUT:def f(): pass");
    assert_eq!(state.current_text, state.history[1].stabilized_text);
}

#[tokio::test]
async fn test_history_length_matches_cycles() {
    for cycles in [1, 3, 5] {
        let pipeline =
            TransmutePipeline::new(echo(), options(cycles)).with_prompts(passthrough_prompts());
        let state = pipeline.run("source", &mut NoopObserver, || false).await;

        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(state.history.len(), cycles as usize);
        for (index, record) in state.history.iter().enumerate() {
            assert_eq!(record.cycle_number as usize, index + 1);
        }
    }
}

#[tokio::test]
async fn test_cancel_before_start_makes_no_calls() {
    let provider = echo();
    let flag = CancelFlag::new();
    flag.cancel();

    let pipeline = TransmutePipeline::new(provider.clone(), options(3));
    let state = pipeline
        .run("source", &mut NoopObserver, || flag.is_cancelled())
        .await;

    assert_eq!(state.phase, Phase::Idle);
    assert!(state.history.is_empty());
    assert_eq!(state.current_text, "source");
    assert!(state.error.is_none());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_always_rate_limited_fails_after_four_attempts() {
    let provider = Arc::new(RateLimitedProvider {
        calls: AtomicUsize::new(0),
    });
    let pipeline = TransmutePipeline::new(provider.clone(), options(3)).with_retry_policy(no_wait());

    let state = pipeline.run("source", &mut NoopObserver, || false).await;

    assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    assert_eq!(state.phase, Phase::Error);
    assert_eq!(state.error.as_deref(), Some("Too Many Requests"));
    assert!(state.history.is_empty());
    assert_eq!(state.current_text, "source");
}

#[tokio::test]
async fn test_blank_mutation_still_yields_material() {
    let pipeline = TransmutePipeline::new(Arc::new(SilentMutator), options(2))
        .with_prompts(passthrough_prompts());

    let state = pipeline
        .run("first line\nsecond line", &mut NoopObserver, || false)
        .await;

    assert_eq!(state.phase, Phase::Complete);
    for record in state.history.iter() {
        assert!(!record.mutated_text.trim().is_empty());
        assert!(!record.stabilized_text.trim().is_empty());
    }
    assert_eq!(state.history[0].mutated_text, "second line\nfirst line");
}

#[tokio::test]
async fn test_current_text_invariant_holds() {
    let pipeline = TransmutePipeline::new(echo(), options(3)).with_prompts(passthrough_prompts());
    let state = pipeline.run("x", &mut NoopObserver, || false).await;

    assert!(state.history.len() <= state.total_cycles as usize);
    assert_eq!(
        state.current_text,
        state.history.last().unwrap().stabilized_text
    );
}

#[tokio::test]
async fn test_independent_runs_do_not_share_state() {
    let pipeline = TransmutePipeline::new(echo(), options(1)).with_prompts(passthrough_prompts());

    let first = pipeline.run("alpha", &mut NoopObserver, || false).await;
    let second = pipeline.run("beta", &mut NoopObserver, || false).await;

    assert_eq!(first.history.len(), 1);
    assert_eq!(second.history.len(), 1);
    assert_eq!(second.history[0].mutated_text, "MUT:beta");
}
