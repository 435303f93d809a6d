// ABOUTME: Ollama local-model adapter implementing the ModelBackend trait.
// ABOUTME: Uses the non-streaming /api/chat endpoint and /api/tags for model listing.

use async_trait::async_trait;
use serde_json::{Value, json};

use inkwell_core::{ProviderError, ProviderKind};

use crate::backend::{ModelBackend, ModelRequest, ModelResponse, TokenUsage};
use crate::providers::{chat_messages_json, empty_response, malformed, send_json};

/// Backend for a local Ollama server. Needs no API key.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    label: String,
}

impl OllamaBackend {
    /// Optional: `OLLAMA_BASE_URL` (defaults to http://localhost:11434)
    /// Optional: `OLLAMA_MODEL` (defaults to llama3.1)
    pub fn from_env() -> Self {
        let kind = ProviderKind::Ollama;
        let base_url = std::env::var(kind.base_url_env())
            .unwrap_or_else(|_| kind.default_base_url().to_string());
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| kind.default_model().to_string());
        Self::new(base_url, model)
    }

    pub fn new(base_url: String, model: String) -> Self {
        let label = format!("{}/{}", ProviderKind::Ollama.label(), model);
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            label,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Build the JSON request body for /api/chat.
    pub fn build_request_body(&self, request: &ModelRequest) -> Value {
        let limits = request.effective_limits();
        json!({
            "model": self.model,
            "stream": false,
            "messages": chat_messages_json(&request.system, &request.messages),
            "options": {
                "num_predict": limits.max_tokens,
                "temperature": limits.temperature
            }
        })
    }

    pub fn parse_response(&self, response_body: &Value) -> Result<ModelResponse, ProviderError> {
        let message = response_body
            .get("message")
            .ok_or_else(|| malformed(&self.label, "missing message in response"))?;
        let text = message.get("content").and_then(|c| c.as_str()).unwrap_or("");
        if text.trim().is_empty() {
            return Err(empty_response(&self.label));
        }

        Ok(ModelResponse {
            text: text.to_string(),
            model: response_body
                .get("model")
                .and_then(|m| m.as_str())
                .unwrap_or(&self.model)
                .to_string(),
            usage: TokenUsage {
                input_tokens: response_body
                    .get("prompt_eval_count")
                    .and_then(|t| t.as_u64())
                    .unwrap_or(0),
                output_tokens: response_body
                    .get("eval_count")
                    .and_then(|t| t.as_u64())
                    .unwrap_or(0),
            },
        })
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        let body = self.build_request_body(request);
        let url = format!("{}/api/chat", self.base_url);
        let response_body = send_json(self.client.post(&url).json(&body), &self.label).await?;
        self.parse_response(&response_body)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let body = send_json(self.client.get(&url), &self.label).await?;
        let models = body
            .get("models")
            .and_then(|m| m.as_array())
            .ok_or_else(|| malformed(&self.label, "missing models array in tags"))?;
        Ok(models
            .iter()
            .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
            .map(String::from)
            .collect())
    }

    fn provider_name(&self) -> &str {
        ProviderKind::Ollama.label()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
