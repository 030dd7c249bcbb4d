//! Transmute configuration parser
//!
//! Parses `transmute.toml` into provider, pipeline, retry and prompt settings.
//! Every section is optional; missing values fall back to the defaults below.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::invoker::RetryPolicy;
use crate::pipeline::prompts::PromptOverrides;

/// Which backend implements the text provider contract
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions (hosted, vLLM, llama.cpp)
    Openai,
    /// Google Gemini `generateContent`
    Gemini,
    /// Local Ollama daemon
    Ollama,
    /// Claude Code CLI in print mode
    ClaudeCode,
}

impl ProviderKind {
    /// Environment variable consulted for the API key when none is configured.
    #[must_use]
    pub const fn default_api_key_env(self) -> Option<&'static str> {
        match self {
            Self::Openai => Some("OPENAI_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Ollama | Self::ClaudeCode => None,
        }
    }

    /// Model used when the config does not name one.
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Openai => "gpt-4o-mini",
            Self::Gemini => "gemini-2.0-flash",
            Self::Ollama => "llama3.1",
            Self::ClaudeCode => "sonnet",
        }
    }
}

/// Backend selection and connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Backend kind
    pub kind: ProviderKind,
    /// Model name; defaults per kind when omitted
    #[serde(default)]
    pub model: Option<String>,
    /// Override for the backend's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Per-request timeout. None means requests may block indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Openai,
            model: None,
            base_url: None,
            api_key_env: None,
            request_timeout_secs: None,
        }
    }
}

impl ProviderConfig {
    /// The configured model, or the kind's default.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.kind.default_model())
    }

    /// The environment variable to read the API key from, if this kind uses one.
    #[must_use]
    pub fn api_key_var(&self) -> Option<&str> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.kind.default_api_key_env())
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Cycle count and sampling temperatures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Number of mutate/stabilize cycles
    #[serde(default = "default_cycles")]
    pub cycles: u32,
    /// Temperature for the mutation phase
    #[serde(default = "default_mutate_temperature")]
    pub mutate_temperature: f32,
    /// Temperature for the stabilization phase
    #[serde(default = "default_stabilize_temperature")]
    pub stabilize_temperature: f32,
}

const fn default_cycles() -> u32 {
    3
}

const fn default_mutate_temperature() -> f32 {
    1.2
}

const fn default_stabilize_temperature() -> f32 {
    0.2
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cycles: default_cycles(),
            mutate_temperature: default_mutate_temperature(),
            stabilize_temperature: default_stabilize_temperature(),
        }
    }
}

/// Retry budget for transient provider failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Additional attempts after the first failure (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `base * 2^n` (default: 1000ms)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for a single backoff delay (default: 30000ms)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    1000
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Convert into the invoker's policy.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Top-level configuration parsed from transmute.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransmuteConfig {
    /// Provider backend
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Cycle settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Retry settings
    #[serde(default)]
    pub retry: RetryConfig,
    /// Instruction template overrides
    #[serde(default)]
    pub prompts: PromptOverrides,
}

impl TransmuteConfig {
    /// Parse a transmute.toml file from a path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse transmute.toml content from a string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse transmute.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.cycles == 0 {
            bail!("pipeline.cycles must be at least 1");
        }

        validate_temperature("pipeline.mutate_temperature", self.pipeline.mutate_temperature)?;
        validate_temperature(
            "pipeline.stabilize_temperature",
            self.pipeline.stabilize_temperature,
        )?;

        if self.provider.model_name().trim().is_empty() {
            bail!("provider.model cannot be empty");
        }

        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            bail!(
                "retry.max_delay_ms ({}) must not be smaller than retry.base_delay_ms ({})",
                self.retry.max_delay_ms,
                self.retry.base_delay_ms
            );
        }

        Ok(())
    }
}

fn validate_temperature(field: &str, value: f32) -> Result<()> {
    if !(0.0..=2.0).contains(&value) {
        bail!("Invalid {field} {value}: expected a value between 0.0 and 2.0");
    }
    Ok(())
}
