//! Text provider backends
//!
//! Every backend implements [`TextProvider`]: given an optional system
//! instruction, a user prompt and a sampling temperature, return generated
//! text or a [`ProviderError`]. Backends differ only in transport.

pub mod claude;
pub mod gemini;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::{ProviderConfig, ProviderKind};

pub use claude::ClaudeCodeProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

/// A single generation request. Built fresh for every call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    /// Optional system instruction
    pub system_prompt: Option<String>,
    /// The user prompt
    pub user_prompt: String,
    /// Sampling temperature
    pub temperature: f32,
}

impl ProviderRequest {
    /// Build a request with a system instruction.
    #[must_use]
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            user_prompt: user_prompt.into(),
            temperature,
        }
    }
}

/// A failed provider call.
///
/// `status` mirrors the HTTP status when the backend reported one. The message
/// is kept verbatim so it can be surfaced to the user unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    status: Option<u16>,
    message: String,
}

impl ProviderError {
    /// An error without a status (transport failure, malformed response, ...).
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// An error carrying an HTTP-like status code.
    #[must_use]
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// The status code, if the backend reported one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    /// The verbatim error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Rate limits (429), cancelled requests (499) and server errors (5xx)
    /// may succeed on retry. Everything else is terminal.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.status, Some(429 | 499 | 500..=599))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::with_status(status.as_u16(), err.to_string()),
            None => Self::new(err.to_string()),
        }
    }
}

/// Turn a non-success HTTP response into a status-carrying error.
pub(crate) async fn error_for_status(backend: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ProviderError::with_status(
        status.as_u16(),
        format!("{backend} request failed with status {status}: {body}"),
    )
}

/// The capability every generative backend provides.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Short backend name for logs and display.
    fn name(&self) -> &str;

    /// Generate text for the request. An empty string is a valid result.
    async fn generate_text(&self, request: &ProviderRequest) -> Result<String, ProviderError>;
}

/// Build the backend described by the provider config.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn TextProvider>> {
    let model = config.model_name().to_string();
    let timeout = config.request_timeout();

    let provider: Arc<dyn TextProvider> = match config.kind {
        ProviderKind::Openai => {
            // Local OpenAI-compatible daemons usually run without a key.
            let api_key = match &config.base_url {
                Some(_) => config.api_key_var().and_then(|var| std::env::var(var).ok()),
                None => Some(read_api_key(config)?),
            };
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or(openai::DEFAULT_BASE_URL);
            Arc::new(OpenAiProvider::new(base_url, model, api_key, timeout)?)
        }
        ProviderKind::Gemini => {
            let api_key = read_api_key(config)?;
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or(gemini::DEFAULT_BASE_URL);
            Arc::new(GeminiProvider::new(base_url, model, api_key, timeout)?)
        }
        ProviderKind::Ollama => {
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or(ollama::DEFAULT_BASE_URL);
            Arc::new(OllamaProvider::new(base_url, model, timeout)?)
        }
        ProviderKind::ClaudeCode => Arc::new(ClaudeCodeProvider::new(Some(model))),
    };

    Ok(provider)
}

fn read_api_key(config: &ProviderConfig) -> Result<String> {
    let var = config
        .api_key_var()
        .context("No API key environment variable configured for this provider")?;
    std::env::var(var).with_context(|| format!("Missing API key: set the {var} environment variable"))
}

/// Build the shared HTTP client, applying the optional request timeout.
pub(crate) fn http_client(timeout: Option<std::time::Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().context("Failed to build HTTP client")
}
