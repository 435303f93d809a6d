// ABOUTME: Provider module aggregating all language-model backend adapters.
// ABOUTME: Holds the descriptor-driven factory plus shared HTTP status and transport classification.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use inkwell_core::{ProviderDescriptor, ProviderError, ProviderErrorCode, ProviderKind};

use crate::backend::{ChatMessage, ModelBackend};

pub use anthropic::AnthropicBackend;
pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

/// Build a backend for the given descriptor.
///
/// Remote kinds require an API key; a descriptor without one yields a
/// `not_configured` error instead of a backend that fails on every call.
pub fn create_backend(descriptor: &ProviderDescriptor) -> Result<Arc<dyn ModelBackend>, ProviderError> {
    let key = descriptor.key();
    let api_key = match (&descriptor.api_key, descriptor.kind.requires_api_key()) {
        (Some(k), _) if !k.trim().is_empty() => k.clone(),
        (_, false) => String::new(),
        _ => {
            return Err(ProviderError::new(
                &key,
                ProviderErrorCode::NotConfigured,
                format!(
                    "missing API key (set {})",
                    descriptor.kind.api_key_env().unwrap_or("api_key")
                ),
            ));
        }
    };

    let client = http_client(descriptor.timeout(), &key)?;
    let base_url = descriptor.resolved_base_url();
    let model = descriptor.model.clone();

    let backend: Arc<dyn ModelBackend> = match descriptor.kind {
        ProviderKind::Anthropic => {
            Arc::new(AnthropicBackend::new(api_key, base_url, model).with_client(client))
        }
        ProviderKind::OpenAi => {
            Arc::new(OpenAiBackend::new(api_key, base_url, model).with_client(client))
        }
        ProviderKind::Gemini => {
            Arc::new(GeminiBackend::new(api_key, base_url, model).with_client(client))
        }
        ProviderKind::Ollama => Arc::new(OllamaBackend::new(base_url, model).with_client(client)),
    };
    Ok(backend)
}

/// A reqwest client that enforces the descriptor's request timeout.
fn http_client(timeout: Duration, provider: &impl std::fmt::Display) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| {
            ProviderError::new(provider, ProviderErrorCode::NotConfigured, format!("http client: {}", e))
        })
}

/// Send a prepared request and decode the JSON body, classifying every failure.
pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
    provider: &str,
) -> Result<Value, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| classify_transport(&e, provider))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(status, &body, provider));
    }

    response.json().await.map_err(|e| {
        ProviderError::new(
            provider,
            ProviderErrorCode::MalformedResponse,
            format!("failed to parse JSON: {}", e),
        )
    })
}

/// Map a non-success HTTP status onto an error code.
pub(crate) fn classify_status(status: reqwest::StatusCode, body: &str, provider: &str) -> ProviderError {
    let code = if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ProviderErrorCode::RateLimited
    } else if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        ProviderErrorCode::Authentication
    } else if status == reqwest::StatusCode::REQUEST_TIMEOUT {
        ProviderErrorCode::Timeout
    } else if status.is_server_error() {
        ProviderErrorCode::Server
    } else {
        ProviderErrorCode::BadRequest
    };

    let message = if body.is_empty() {
        format!("API error {}", status)
    } else {
        format!("API error {}: {}", status, truncate(body, 500))
    };
    ProviderError::new(provider, code, message)
}

pub(crate) fn classify_transport(err: &reqwest::Error, provider: &str) -> ProviderError {
    let code = if err.is_timeout() {
        ProviderErrorCode::Timeout
    } else {
        ProviderErrorCode::Network
    };
    ProviderError::new(provider, code, format!("HTTP request failed: {}", err))
}

pub(crate) fn malformed(provider: &str, message: impl Into<String>) -> ProviderError {
    ProviderError::new(provider, ProviderErrorCode::MalformedResponse, message)
}

pub(crate) fn empty_response(provider: &str) -> ProviderError {
    ProviderError::new(provider, ProviderErrorCode::EmptyResponse, "response contained no text")
}

/// Coalesce consecutive messages with the same role into single messages.
/// Anthropic and Gemini require alternating user/assistant turns.
pub(crate) fn coalesce_messages(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut result: Vec<ChatMessage> = Vec::new();
    for msg in messages {
        if let Some(last) = result.last_mut()
            && last.role == msg.role
        {
            last.content = format!("{}\n\n{}", last.content, msg.content);
            continue;
        }
        result.push(msg.clone());
    }
    result
}

/// Role/content pairs in the OpenAI-style layout shared by OpenAI and Ollama.
pub(crate) fn chat_messages_json(system: &str, messages: &[ChatMessage]) -> Vec<Value> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if !system.is_empty() {
        out.push(json!({"role": "system", "content": system}));
    }
    for msg in messages {
        out.push(json!({"role": msg.role.label(), "content": msg.content}));
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell_core::ProviderKind;

    #[test]
    fn status_classification() {
        use reqwest::StatusCode;

        let cases = [
            (StatusCode::TOO_MANY_REQUESTS, ProviderErrorCode::RateLimited),
            (StatusCode::UNAUTHORIZED, ProviderErrorCode::Authentication),
            (StatusCode::FORBIDDEN, ProviderErrorCode::Authentication),
            (StatusCode::INTERNAL_SERVER_ERROR, ProviderErrorCode::Server),
            (StatusCode::BAD_GATEWAY, ProviderErrorCode::Server),
            (StatusCode::BAD_REQUEST, ProviderErrorCode::BadRequest),
            (StatusCode::NOT_FOUND, ProviderErrorCode::BadRequest),
        ];
        for (status, expected) in cases {
            let err = classify_status(status, "", "anthropic/claude");
            assert_eq!(err.code, expected, "status {}", status);
        }
    }

    #[test]
    fn status_error_truncates_long_bodies() {
        let body = "x".repeat(2000);
        let err = classify_status(reqwest::StatusCode::BAD_REQUEST, &body, "openai/gpt-4o");
        assert!(err.message.len() < 600);
        assert!(err.message.ends_with("..."));
    }

    #[test]
    fn remote_backend_without_key_is_not_configured() {
        let descriptor = ProviderDescriptor::new(ProviderKind::OpenAi, "gpt-4o");
        let err = match create_backend(&descriptor) {
            Err(e) => e,
            Ok(_) => panic!("expected missing key error"),
        };
        assert_eq!(err.code, ProviderErrorCode::NotConfigured);
        assert!(err.message.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn factory_builds_each_kind() {
        let cases = [
            ProviderDescriptor::new(ProviderKind::Anthropic, "claude-x").with_api_key("k"),
            ProviderDescriptor::new(ProviderKind::OpenAi, "gpt-x").with_api_key("k"),
            ProviderDescriptor::new(ProviderKind::Gemini, "gemini-x").with_api_key("k"),
            ProviderDescriptor::new(ProviderKind::Ollama, "llama3.1"),
        ];
        for descriptor in cases {
            let backend = match create_backend(&descriptor) {
                Ok(b) => b,
                Err(e) => panic!("failed to build {}: {}", descriptor.key(), e),
            };
            assert_eq!(backend.provider_name(), descriptor.kind.label());
            assert_eq!(backend.model_name(), descriptor.model);
        }
    }

    #[test]
    fn coalesce_merges_same_role_runs() {
        let messages = vec![
            ChatMessage::user("First"),
            ChatMessage::user("Second"),
            ChatMessage::assistant("Reply"),
            ChatMessage::user("Third"),
        ];
        let result = coalesce_messages(&messages);
        assert_eq!(result.len(), 3);
        assert!(result[0].content.contains("First"));
        assert!(result[0].content.contains("Second"));
    }
}
