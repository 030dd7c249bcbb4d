//! Resilient invoker
//!
//! Wraps a provider call with bounded exponential-backoff retry. Transient
//! failures (429, 499, 5xx) are retried; terminal failures and an exhausted
//! budget return the original error unchanged.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::provider::ProviderError;

/// Retry budget and backoff shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure
    pub max_retries: u32,
    /// Retry `n` (1-based) waits `base_delay * 2^n`
    pub base_delay: Duration,
    /// Cap for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// Three retries at 2s, 4s and 8s.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs provider calls under a [`RetryPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResilientInvoker {
    policy: RetryPolicy,
}

impl ResilientInvoker {
    /// Create an invoker with the given policy.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The active retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `call` until it succeeds, fails terminally, or the budget runs out.
    ///
    /// `is_cancelled` is polled before every retry. A cancelled run gets an
    /// empty string back instead of an error.
    pub async fn invoke<F, Fut>(
        &self,
        mut call: F,
        is_cancelled: &dyn Fn() -> bool,
    ) -> Result<String, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, ProviderError>>,
    {
        let mut attempt: u32 = 0;

        loop {
            match call().await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_transient() && attempt < self.policy.max_retries => {
                    attempt += 1;

                    if is_cancelled() {
                        debug!(attempt, "cancelled before retry");
                        return Ok(String::new());
                    }

                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        attempt,
                        max_retries = self.policy.max_retries,
                        status = ?err.status(),
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient provider failure, backing off"
                    );
                    tokio::time::sleep(delay).await;

                    if is_cancelled() {
                        debug!(attempt, "cancelled during backoff");
                        return Ok(String::new());
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}
