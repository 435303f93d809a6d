// ABOUTME: Defines the ModelBackend trait that every language-model adapter implements.
// ABOUTME: Also defines the provider-neutral request and response shapes passed through the gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use inkwell_core::{ProviderError, RequestLimits};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A single completion request, independent of any backend's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    /// None means "use the serving backend's configured limits".
    pub limits: Option<RequestLimits>,
}

impl ModelRequest {
    /// A request holding one user message.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            system: String::new(),
            messages: vec![ChatMessage::user(text)],
            limits: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    pub fn with_limits(mut self, limits: RequestLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn effective_limits(&self) -> RequestLimits {
        self.limits.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The text a backend produced, plus accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub text: String,
    pub model: String,
    #[serde(default)]
    pub usage: TokenUsage,
}

/// Trait that all language-model adapters implement. Each adapter
/// (Anthropic, OpenAI, Gemini, Ollama) translates a ModelRequest into its
/// API's wire format and classifies failures into ProviderErrorCodes.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Run one completion. Must not retry; the gateway owns retries.
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ProviderError>;

    /// Model identifiers the backend's service advertises.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;

    /// Provider name for logging and display (e.g. "anthropic", "ollama").
    fn provider_name(&self) -> &str;

    /// Model identifier being used (e.g. "claude-sonnet-4-5-20250929").
    fn model_name(&self) -> &str;
}
