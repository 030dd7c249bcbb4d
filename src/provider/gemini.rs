//! Google Gemini backend (`generateContent` REST API).

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{error_for_status, http_client, ProviderError, ProviderRequest, TextProvider};

/// Public Gemini endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Client for `models/{model}:generateContent`.
#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GeminiProvider {
    /// Create a new client.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: String,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    fn build_request(request: &ProviderRequest) -> GenerateRequest {
        GenerateRequest {
            system_instruction: request.system_prompt.as_ref().map(|system| Content {
                role: None,
                parts: vec![Part {
                    text: Some(system.clone()),
                }],
            }),
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(request.user_prompt.clone()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        }
    }

    /// Join the text parts of the first candidate. No candidates yields "".
    fn extract_text(response: GenerateResponse) -> String {
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_request(request))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status("Gemini", response).await);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to parse Gemini response: {e}")))?;

        Ok(Self::extract_text(parsed))
    }
}
