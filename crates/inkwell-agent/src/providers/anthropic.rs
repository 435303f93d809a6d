// ABOUTME: Anthropic Claude API adapter implementing the ModelBackend trait.
// ABOUTME: Translates ModelRequests into Anthropic Messages API calls and joins the text blocks.

use async_trait::async_trait;
use serde_json::{Value, json};

use inkwell_core::{ProviderError, ProviderErrorCode, ProviderKind};

use crate::backend::{ModelBackend, ModelRequest, ModelResponse, TokenUsage};
use crate::providers::{coalesce_messages, empty_response, malformed, send_json};

const API_VERSION: &str = "2023-06-01";

/// Anthropic Claude backend. Calls the Messages API and returns the
/// concatenated text content of the reply.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    label: String,
}

impl AnthropicBackend {
    /// Create a new AnthropicBackend reading configuration from environment variables.
    /// Required: `ANTHROPIC_API_KEY`
    /// Optional: `ANTHROPIC_BASE_URL` (defaults to https://api.anthropic.com)
    /// Optional: `ANTHROPIC_MODEL` (defaults to claude-sonnet-4-5-20250929)
    pub fn from_env() -> Result<Self, ProviderError> {
        let kind = ProviderKind::Anthropic;
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            ProviderError::new(
                kind.label(),
                ProviderErrorCode::NotConfigured,
                "ANTHROPIC_API_KEY not set",
            )
        })?;
        let base_url = std::env::var(kind.base_url_env())
            .unwrap_or_else(|_| kind.default_base_url().to_string());
        let model =
            std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| kind.default_model().to_string());

        Ok(Self::new(api_key, base_url, model))
    }

    /// Create a new AnthropicBackend with explicit configuration.
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let label = format!("{}/{}", ProviderKind::Anthropic.label(), model);
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            label,
        }
    }

    /// Replace the HTTP client, e.g. with one carrying a timeout.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Build the JSON request body for the Anthropic Messages API.
    pub fn build_request_body(&self, request: &ModelRequest) -> Value {
        let limits = request.effective_limits();

        let mut messages: Vec<Value> = coalesce_messages(&request.messages)
            .into_iter()
            .map(|m| json!({"role": m.role.label(), "content": m.content}))
            .collect();

        // The API requires the conversation to open with a user turn.
        if messages
            .first()
            .and_then(|m| m.get("role"))
            .and_then(|r| r.as_str())
            != Some("user")
        {
            messages.insert(0, json!({"role": "user", "content": "Continue."}));
        }

        let mut body = json!({
            "model": self.model,
            "max_tokens": limits.max_tokens,
            "temperature": limits.temperature,
            "messages": messages
        });
        if !request.system.is_empty() {
            body["system"] = json!(request.system);
        }
        body
    }

    /// Parse an Anthropic Messages API response into a ModelResponse.
    pub fn parse_response(&self, response_body: &Value) -> Result<ModelResponse, ProviderError> {
        let content = response_body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| malformed(&self.label, "missing content array in response"))?;

        let text: Vec<&str> = content
            .iter()
            .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
            .collect();
        let text = text.join("");

        if text.trim().is_empty() {
            return Err(empty_response(&self.label));
        }

        let usage = response_body.get("usage");
        Ok(ModelResponse {
            text,
            model: response_body
                .get("model")
                .and_then(|m| m.as_str())
                .unwrap_or(&self.model)
                .to_string(),
            usage: TokenUsage {
                input_tokens: usage
                    .and_then(|u| u.get("input_tokens"))
                    .and_then(|t| t.as_u64())
                    .unwrap_or(0),
                output_tokens: usage
                    .and_then(|u| u.get("output_tokens"))
                    .and_then(|t| t.as_u64())
                    .unwrap_or(0),
            },
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
    }
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        let body = self.build_request_body(request);
        let url = format!("{}/v1/messages", self.base_url);

        let response_body = send_json(
            self.authorized(self.client.post(&url))
                .header("content-type", "application/json")
                .json(&body),
            &self.label,
        )
        .await?;

        self.parse_response(&response_body)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/v1/models", self.base_url);
        let body = send_json(self.authorized(self.client.get(&url)), &self.label).await?;
        parse_model_list(&body, &self.label)
    }

    fn provider_name(&self) -> &str {
        ProviderKind::Anthropic.label()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// `{"data": [{"id": ...}, ...]}`, the layout shared by Anthropic and OpenAI.
pub(crate) fn parse_model_list(body: &Value, label: &str) -> Result<Vec<String>, ProviderError> {
    let data = body
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| malformed(label, "missing data array in model list"))?;
    Ok(data
        .iter()
        .filter_map(|m| m.get("id").and_then(|id| id.as_str()))
        .map(String::from)
        .collect())
}
