// ABOUTME: Describes language-model providers: which service, which model, credentials and limits.
// ABOUTME: A ProviderKey (kind + model) identifies one backend; several models may share a kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
const MAX_TIMEOUT_SECS: u64 = 600;

/// The external language-model service a backend talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Gemini,
    Ollama,
}

impl ProviderKind {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Default API base URL for this provider.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }

    /// Model used when configuration names a provider but no model.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-sonnet-4-5-20250929",
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::Ollama => "llama3.1",
        }
    }

    /// Environment variable holding the API key, if the service needs one.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }

    /// Environment variable that overrides the base URL.
    pub fn base_url_env(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_BASE_URL",
            ProviderKind::OpenAi => "OPENAI_BASE_URL",
            ProviderKind::Gemini => "GEMINI_BASE_URL",
            ProviderKind::Ollama => "OLLAMA_BASE_URL",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        self.api_key_env().is_some()
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(format!("unsupported LLM provider: {}", other)),
        }
    }
}

/// Identifies a single backend: a provider kind paired with a model name.
/// Rendered and parsed as `kind/model`; a bare kind resolves to its default model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProviderKey {
    pub kind: ProviderKind,
    pub model: String,
}

impl ProviderKey {
    pub fn new(kind: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
        }
    }
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.model)
    }
}

impl FromStr for ProviderKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, model) = match s.split_once('/') {
            Some((kind, model)) => (kind.parse::<ProviderKind>()?, model.trim().to_string()),
            None => {
                let kind = s.parse::<ProviderKind>()?;
                (kind, kind.default_model().to_string())
            }
        };
        if model.is_empty() {
            return Err(format!("provider key '{}' has an empty model name", s));
        }
        Ok(Self { kind, model })
    }
}

impl Serialize for ProviderKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProviderKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-request generation limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestLimits {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Configuration for one backend the gateway can dispatch to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub kind: ProviderKind,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub limits: RequestLimits,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_enabled() -> bool {
    true
}

impl ProviderDescriptor {
    /// Create an enabled descriptor with default limits and no credentials.
    pub fn new(kind: ProviderKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            api_key: None,
            base_url: None,
            limits: RequestLimits::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            enabled: true,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn key(&self) -> ProviderKey {
        ProviderKey::new(self.kind, self.model.clone())
    }

    /// Base URL with any trailing slash removed.
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(self.kind.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// Timeout clamped into the supported range.
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs.clamp(1, MAX_TIMEOUT_SECS))
    }

    /// True when the descriptor carries everything its provider needs to be called.
    pub fn has_credentials(&self) -> bool {
        !self.kind.requires_api_key()
            || self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_key_round_trips_through_display() {
        let key = ProviderKey::new(ProviderKind::OpenAi, "gpt-4o-mini");
        assert_eq!(key.to_string(), "openai/gpt-4o-mini");
        assert_eq!(key.to_string().parse::<ProviderKey>().unwrap(), key);
    }

    #[test]
    fn bare_kind_resolves_default_model() {
        let key: ProviderKey = "gemini".parse().unwrap();
        assert_eq!(key.kind, ProviderKind::Gemini);
        assert_eq!(key.model, "gemini-2.0-flash");
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = "mystery/model".parse::<ProviderKey>().unwrap_err();
        assert!(err.contains("unsupported LLM provider"));
    }

    #[test]
    fn empty_model_is_rejected() {
        assert!("anthropic/".parse::<ProviderKey>().is_err());
    }

    #[test]
    fn model_names_may_contain_slashes() {
        let key: ProviderKey = "ollama/library/mistral:7b".parse().unwrap();
        assert_eq!(key.kind, ProviderKind::Ollama);
        assert_eq!(key.model, "library/mistral:7b");
    }

    #[test]
    fn descriptor_credentials() {
        let remote = ProviderDescriptor::new(ProviderKind::Anthropic, "claude");
        assert!(!remote.has_credentials());
        assert!(remote.clone().with_api_key("sk-test").has_credentials());
        assert!(!remote.with_api_key("  ").has_credentials());

        let local = ProviderDescriptor::new(ProviderKind::Ollama, "llama3.1");
        assert!(local.has_credentials());
    }

    #[test]
    fn descriptor_base_url_and_timeout() {
        let desc = ProviderDescriptor::new(ProviderKind::OpenAi, "gpt-4o")
            .with_base_url("http://localhost:8080/");
        assert_eq!(desc.resolved_base_url(), "http://localhost:8080");

        let mut desc = ProviderDescriptor::new(ProviderKind::Gemini, "gemini-2.0-flash");
        assert_eq!(desc.resolved_base_url(), "https://generativelanguage.googleapis.com");
        desc.timeout_secs = 0;
        assert_eq!(desc.timeout().as_secs(), 1);
        desc.timeout_secs = 10_000;
        assert_eq!(desc.timeout().as_secs(), 600);
    }

    #[test]
    fn descriptor_yaml_defaults() {
        let desc: ProviderDescriptor =
            serde_yaml::from_str("kind: anthropic\nmodel: claude-sonnet-4-5-20250929\n").unwrap();
        assert!(desc.enabled);
        assert_eq!(desc.limits, RequestLimits::default());
        assert_eq!(desc.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(desc.api_key.is_none());
    }
}
