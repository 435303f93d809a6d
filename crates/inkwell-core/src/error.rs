// ABOUTME: Error taxonomy shared across inkwell crates.
// ABOUTME: ConfigurationError covers bad references; ProviderError covers backend failures with a code.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::ProviderKey;
use crate::specialty::Specialty;
use crate::workflow::WorkflowError;

/// A reference to something that is not configured or not enabled.
/// Raised before any network call is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("agent is disabled: {0}")]
    AgentDisabled(String),

    #[error("no enabled agent for specialty: {0}")]
    NoAgentForSpecialty(Specialty),

    #[error("unknown workflow: {0}")]
    UnknownWorkflow(String),

    #[error("invalid workflow: {0}")]
    InvalidWorkflow(#[from] WorkflowError),

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("unknown collaboration session: {0}")]
    UnknownSession(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Classification of a backend failure. Drives the gateway's retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    Timeout,
    Network,
    RateLimited,
    Server,
    Authentication,
    BadRequest,
    EmptyResponse,
    MalformedResponse,
    NotConfigured,
}

impl ProviderErrorCode {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderErrorCode::Timeout => "timeout",
            ProviderErrorCode::Network => "network",
            ProviderErrorCode::RateLimited => "rate_limited",
            ProviderErrorCode::Server => "server",
            ProviderErrorCode::Authentication => "authentication",
            ProviderErrorCode::BadRequest => "bad_request",
            ProviderErrorCode::EmptyResponse => "empty_response",
            ProviderErrorCode::MalformedResponse => "malformed_response",
            ProviderErrorCode::NotConfigured => "not_configured",
        }
    }

    /// Transient failures worth another attempt after backing off.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderErrorCode::Timeout
                | ProviderErrorCode::Network
                | ProviderErrorCode::RateLimited
                | ProviderErrorCode::Server
                | ProviderErrorCode::EmptyResponse
        )
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A failure talking to a language-model backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provider {provider} failed ({code}): {message}")]
pub struct ProviderError {
    /// Display form of the backend's ProviderKey, or the requested key when unresolved.
    pub provider: String,
    pub code: ProviderErrorCode,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: impl fmt::Display, code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            code,
            message: message.into(),
        }
    }

    pub fn not_configured(key: &ProviderKey) -> Self {
        Self::new(key, ProviderErrorCode::NotConfigured, "no enabled backend registered")
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}
