// ABOUTME: OpenAI Chat Completions adapter implementing the ModelBackend trait.
// ABOUTME: Sends the system prompt as a leading system message and reads the first choice.

use async_trait::async_trait;
use serde_json::{Value, json};

use inkwell_core::{ProviderError, ProviderErrorCode, ProviderKind};

use crate::backend::{ModelBackend, ModelRequest, ModelResponse, TokenUsage};
use crate::providers::anthropic::parse_model_list;
use crate::providers::{chat_messages_json, empty_response, malformed, send_json};

/// OpenAI backend. Also works against OpenAI-compatible servers via `base_url`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    label: String,
}

impl OpenAiBackend {
    /// Create a new OpenAiBackend reading configuration from environment variables.
    /// Required: `OPENAI_API_KEY`
    /// Optional: `OPENAI_BASE_URL` (defaults to https://api.openai.com)
    /// Optional: `OPENAI_MODEL` (defaults to gpt-4o)
    pub fn from_env() -> Result<Self, ProviderError> {
        let kind = ProviderKind::OpenAi;
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ProviderError::new(kind.label(), ProviderErrorCode::NotConfigured, "OPENAI_API_KEY not set")
        })?;
        let base_url = std::env::var(kind.base_url_env())
            .unwrap_or_else(|_| kind.default_base_url().to_string());
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| kind.default_model().to_string());

        Ok(Self::new(api_key, base_url, model))
    }

    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let label = format!("{}/{}", ProviderKind::OpenAi.label(), model);
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            label,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Build the JSON request body for the Chat Completions API.
    pub fn build_request_body(&self, request: &ModelRequest) -> Value {
        let limits = request.effective_limits();
        json!({
            "model": self.model,
            "max_tokens": limits.max_tokens,
            "temperature": limits.temperature,
            "messages": chat_messages_json(&request.system, &request.messages)
        })
    }

    /// Parse a Chat Completions response into a ModelResponse.
    pub fn parse_response(&self, response_body: &Value) -> Result<ModelResponse, ProviderError> {
        let choice = response_body
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| malformed(&self.label, "missing choices in response"))?;

        let text = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or("");

        if text.trim().is_empty() {
            return Err(empty_response(&self.label));
        }

        let usage = response_body.get("usage");
        Ok(ModelResponse {
            text: text.to_string(),
            model: response_body
                .get("model")
                .and_then(|m| m.as_str())
                .unwrap_or(&self.model)
                .to_string(),
            usage: TokenUsage {
                input_tokens: usage
                    .and_then(|u| u.get("prompt_tokens"))
                    .and_then(|t| t.as_u64())
                    .unwrap_or(0),
                output_tokens: usage
                    .and_then(|u| u.get("completion_tokens"))
                    .and_then(|t| t.as_u64())
                    .unwrap_or(0),
            },
        })
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        let body = self.build_request_body(request);
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response_body = send_json(
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body),
            &self.label,
        )
        .await?;

        self.parse_response(&response_body)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/v1/models", self.base_url);
        let body = send_json(
            self.client
                .get(&url)
                .header("Authorization", format!("Bearer {}", self.api_key)),
            &self.label,
        )
        .await?;
        parse_model_list(&body, &self.label)
    }

    fn provider_name(&self) -> &str {
        ProviderKind::OpenAi.label()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
