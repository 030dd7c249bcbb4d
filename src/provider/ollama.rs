//! Local Ollama daemon backend (`/api/generate`, non-streaming).

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{error_for_status, http_client, ProviderError, ProviderRequest, TextProvider};

/// Default address of a local Ollama daemon.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for a local Ollama daemon.
#[derive(Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaProvider {
    /// Create a new client.
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl TextProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.user_prompt,
            system: request.system_prompt.as_deref(),
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(error_for_status("Ollama", response).await);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to parse Ollama response: {e}")))?;

        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OllamaProvider::new("http://localhost:11434/", "llama3.1", None).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.model, "llama3.1");
    }

    #[test]
    fn test_request_body_disables_streaming() {
        let body = GenerateRequest {
            model: "llama3.1",
            prompt: "hi",
            system: Some("sys"),
            stream: false,
            options: GenerateOptions { temperature: 0.7 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["system"], "sys");
        assert_eq!(json["model"], "llama3.1");
    }

    #[test]
    fn test_response_missing_field_defaults_to_empty() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert_eq!(parsed.response, "");
    }
}
