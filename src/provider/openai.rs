//! OpenAI-compatible chat completions backend.
//!
//! Works against the hosted API and against local servers that speak the same
//! protocol (vLLM, llama.cpp server, LM Studio). The bearer token is optional
//! so local daemons can run without one.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{error_for_status, http_client, ProviderError, ProviderRequest, TextProvider};

/// Hosted OpenAI endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Client for `/v1/chat/completions`.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

/// A chat message with role and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request body for /v1/chat/completions.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

/// Response from /v1/chat/completions.
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - Server root, e.g. `http://localhost:8000` (trailing slash is ignored)
    /// * `model` - Model name sent with every request
    /// * `api_key` - Bearer token, if the server requires one
    /// * `timeout` - Optional per-request timeout
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    fn build_messages(request: &ProviderRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.user_prompt.clone(),
        });
        messages
    }
}

#[async_trait]
impl TextProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            messages: Self::build_messages(request),
            temperature: request.temperature,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut http = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await?;
        if !response.status().is_success() {
            return Err(error_for_status("OpenAI", response).await);
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::new(format!("Failed to parse OpenAI response: {e}")))?;

        Ok(chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}
