// ABOUTME: Google Gemini API adapter implementing the ModelBackend trait.
// ABOUTME: Translates ModelRequests into generateContent calls with a system instruction.

use async_trait::async_trait;
use serde_json::{Value, json};

use inkwell_core::{ProviderError, ProviderErrorCode, ProviderKind};

use crate::backend::{ChatRole, ModelBackend, ModelRequest, ModelResponse, TokenUsage};
use crate::providers::{coalesce_messages, empty_response, malformed, send_json};

/// Google Gemini backend. Calls the generateContent API.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    label: String,
}

impl GeminiBackend {
    /// Create a new GeminiBackend reading configuration from environment variables.
    /// Required: `GEMINI_API_KEY`
    /// Optional: `GEMINI_BASE_URL` (defaults to https://generativelanguage.googleapis.com)
    /// Optional: `GEMINI_MODEL` (defaults to gemini-2.0-flash)
    pub fn from_env() -> Result<Self, ProviderError> {
        let kind = ProviderKind::Gemini;
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            ProviderError::new(kind.label(), ProviderErrorCode::NotConfigured, "GEMINI_API_KEY not set")
        })?;
        let base_url = std::env::var(kind.base_url_env())
            .unwrap_or_else(|_| kind.default_base_url().to_string());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| kind.default_model().to_string());

        Ok(Self::new(api_key, base_url, model))
    }

    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        let label = format!("{}/{}", ProviderKind::Gemini.label(), model);
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

    /// Build the JSON request body for the generateContent API.
    pub fn build_request_body(&self, request: &ModelRequest) -> Value {
        let limits = request.effective_limits();

        let contents: Vec<Value> = coalesce_messages(&request.messages)
            .into_iter()
            .map(|m| {
                let role = match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "model",
                };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generation_config": {
                "max_output_tokens": limits.max_tokens,
                "temperature": limits.temperature
            }
        });
        if !request.system.is_empty() {
            body["system_instruction"] = json!({"parts": [{"text": request.system}]});
        }
        body
    }

    /// Parse a generateContent response into a ModelResponse.
    pub fn parse_response(&self, response_body: &Value) -> Result<ModelResponse, ProviderError> {
        let candidate = response_body
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| malformed(&self.label, "missing candidates in response"))?;

        let text: String = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(empty_response(&self.label));
        }

        let usage = response_body.get("usageMetadata");
        Ok(ModelResponse {
            text,
            model: response_body
                .get("modelVersion")
                .and_then(|m| m.as_str())
                .unwrap_or(&self.model)
                .to_string(),
            usage: TokenUsage {
                input_tokens: usage
                    .and_then(|u| u.get("promptTokenCount"))
                    .and_then(|t| t.as_u64())
                    .unwrap_or(0),
                output_tokens: usage
                    .and_then(|u| u.get("candidatesTokenCount"))
                    .and_then(|t| t.as_u64())
                    .unwrap_or(0),
            },
        })
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError> {
        let body = self.build_request_body(request);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response_body = send_json(
            self.client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&body),
            &self.label,
        )
        .await?;

        self.parse_response(&response_body)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/v1beta/models?key={}", self.base_url, self.api_key);
        let body = send_json(self.client.get(&url), &self.label).await?;
        let models = body
            .get("models")
            .and_then(|m| m.as_array())
            .ok_or_else(|| malformed(&self.label, "missing models array in model list"))?;
        Ok(models
            .iter()
            .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
            .map(|name| name.trim_start_matches("models/").to_string())
            .collect())
    }

    fn provider_name(&self) -> &str {
        ProviderKind::Gemini.label()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatMessage;

    fn backend() -> GeminiBackend {
        GeminiBackend::new(
            "test-key".to_string(),
            "https://generativelanguage.googleapis.com".to_string(),
            "gemini-2.0-flash".to_string(),
        )
    }

    #[test]
    fn gemini_backend_creation() {
        let backend = backend();
        assert_eq!(backend.provider_name(), "gemini");
        assert_eq!(backend.model_name(), "gemini-2.0-flash");
    }

    #[test]
    fn gemini_builds_request_body() {
        let request = ModelRequest {
            system: "You are a plot reviewer".to_string(),
            messages: vec![
                ChatMessage::user("Chapter one summary"),
                ChatMessage::assistant("Noted."),
                ChatMessage::user("Review the pacing"),
            ],
            limits: None,
        };
        let body = backend().build_request_body(&request);

        assert_eq!(
            body["system_instruction"]["parts"][0]["text"],
            "You are a plot reviewer"
        );
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(body["generation_config"]["max_output_tokens"], 4096);
    }

    #[test]
    fn gemini_parses_text_response() {
        let response = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Act two "}, {"text": "drags."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 40, "candidatesTokenCount": 4}
        });
        let parsed = backend().parse_response(&response).unwrap();
        assert_eq!(parsed.text, "Act two drags.");
        assert_eq!(parsed.model, "gemini-2.0-flash");
        assert_eq!(parsed.usage.output_tokens, 4);
    }

    #[test]
    fn gemini_blocked_candidate_is_empty_response() {
        let response = json!({"candidates": [{"finishReason": "SAFETY"}]});
        let err = backend().parse_response(&response).unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::EmptyResponse);
    }

    #[tokio::test]
    #[cfg(feature = "live-test")]
    async fn gemini_adapter_basic() {
        let backend = GeminiBackend::from_env().expect("GEMINI_API_KEY must be set");
        let result = backend
            .complete(&ModelRequest::prompt("Name one theme of Beloved in three words."))
            .await;
        assert!(result.is_ok(), "live test failed: {:?}", result.err());
    }
}
