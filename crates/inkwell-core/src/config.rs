// ABOUTME: Configuration model for inkwell: providers, agents, workflows, and retry settings.
// ABOUTME: Parses YAML, overlays credentials from environment variables, and validates references.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::AgentDescriptor;
use crate::context::HISTORY_WINDOW;
use crate::provider::{ProviderDescriptor, ProviderKey, ProviderKind};
use crate::workflow::{WorkflowDefinition, WorkflowError};

/// Environment variable naming the default provider (`kind` or `kind/model`).
pub const DEFAULT_PROVIDER_ENV: &str = "INKWELL_DEFAULT_PROVIDER";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("INKWELL_DEFAULT_PROVIDER is not a valid provider key: {0}")]
    InvalidDefaultProvider(String),

    #[error("agent '{agent}' references unconfigured provider '{provider}'")]
    UnknownAgentProvider { agent: String, provider: String },

    #[error("duplicate agent id: {0}")]
    DuplicateAgent(String),

    #[error("default provider '{0}' is not configured")]
    UnknownDefaultProvider(String),

    #[error("workflow '{id}' is invalid: {source}")]
    InvalidWorkflow {
        id: String,
        #[source]
        source: WorkflowError,
    },

    #[error("retry.max_attempts must be at least 1")]
    ZeroAttempts,
}

/// Backoff schedule for the provider gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_history_window() -> usize {
    HISTORY_WINDOW
}

/// The complete configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InkwellConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<ProviderKey>,
    #[serde(default)]
    pub retry: RetrySettings,
    /// How many prior conversation records to load into a context.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default)]
    pub providers: Vec<ProviderDescriptor>,
    /// Empty means "one default agent per specialty on the default provider".
    #[serde(default)]
    pub agents: Vec<AgentDescriptor>,
    /// Added to the built-in workflows; a matching id replaces the built-in.
    #[serde(default)]
    pub workflows: Vec<WorkflowDefinition>,
}

impl Default for InkwellConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            retry: RetrySettings::default(),
            history_window: HISTORY_WINDOW,
            providers: Vec::new(),
            agents: Vec::new(),
            workflows: Vec::new(),
        }
    }
}

impl InkwellConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Overlay process environment variables. See `apply_env_with`.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Overlay values from an environment lookup:
    /// - `INKWELL_DEFAULT_PROVIDER` sets the default provider (and adds a
    ///   descriptor for it when none is configured)
    /// - `ANTHROPIC_API_KEY` / `OPENAI_API_KEY` / `GEMINI_API_KEY` fill
    ///   descriptors that carry no key
    /// - `*_BASE_URL` fill descriptors that carry no base URL
    ///
    /// Values already present in the file are never overwritten.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(DEFAULT_PROVIDER_ENV) {
            let key: ProviderKey = raw
                .parse()
                .map_err(|_| ConfigError::InvalidDefaultProvider(raw.clone()))?;
            if !self.providers.iter().any(|p| p.key() == key) {
                self.providers
                    .push(ProviderDescriptor::new(key.kind, key.model.clone()));
            }
            self.default_provider = Some(key);
        }

        for provider in &mut self.providers {
            if provider.api_key.is_none()
                && let Some(var) = provider.kind.api_key_env()
            {
                provider.api_key = get(var);
            }
            if provider.base_url.is_none() {
                provider.base_url = get(provider.kind.base_url_env());
            }
        }

        Ok(())
    }

    /// The provider agents bind to when the config does not say otherwise:
    /// the explicit default, else the first enabled provider, else Anthropic's default model.
    pub fn resolved_default_provider(&self) -> ProviderKey {
        if let Some(key) = &self.default_provider {
            return key.clone();
        }
        self.providers
            .iter()
            .find(|p| p.enabled)
            .map(ProviderDescriptor::key)
            .unwrap_or_else(|| {
                ProviderKey::new(ProviderKind::Anthropic, ProviderKind::Anthropic.default_model())
            })
    }

    /// Configured agents, or the default roster when none are listed.
    pub fn resolved_agents(&self) -> Vec<AgentDescriptor> {
        if self.agents.is_empty() {
            AgentDescriptor::default_roster(&self.resolved_default_provider())
        } else {
            self.agents.clone()
        }
    }

    /// Built-in workflows followed by configured ones; configured ids replace built-ins.
    pub fn resolved_workflows(&self) -> Vec<WorkflowDefinition> {
        let mut workflows: Vec<WorkflowDefinition> = WorkflowDefinition::builtin()
            .into_iter()
            .filter(|b| !self.workflows.iter().any(|w| w.id == b.id))
            .collect();
        workflows.extend(self.workflows.iter().cloned());
        workflows
    }

    /// Check cross references: agents name configured providers, ids are unique,
    /// workflows are DAGs, and the retry ceiling is positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }

        let provider_keys: HashSet<ProviderKey> =
            self.providers.iter().map(ProviderDescriptor::key).collect();

        if let Some(default) = &self.default_provider
            && !provider_keys.contains(default)
        {
            return Err(ConfigError::UnknownDefaultProvider(default.to_string()));
        }

        let mut agent_ids = HashSet::new();
        for agent in &self.agents {
            if !agent_ids.insert(agent.id.as_str()) {
                return Err(ConfigError::DuplicateAgent(agent.id.clone()));
            }
            if !provider_keys.contains(&agent.provider) {
                return Err(ConfigError::UnknownAgentProvider {
                    agent: agent.id.clone(),
                    provider: agent.provider.to_string(),
                });
            }
        }

        for workflow in &self.workflows {
            workflow
                .validate()
                .map_err(|source| ConfigError::InvalidWorkflow {
                    id: workflow.id.clone(),
                    source,
                })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specialty::Specialty;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
default_provider: anthropic/claude-sonnet-4-5-20250929
retry:
  max_attempts: 4
providers:
  - kind: anthropic
    model: claude-sonnet-4-5-20250929
  - kind: openai
    model: gpt-4o
    api_key: sk-from-file
    limits:
      max_tokens: 2048
      temperature: 0.3
agents:
  - id: theme-1
    name: Theme Analyst
    specialty: theme
    provider: anthropic/claude-sonnet-4-5-20250929
  - id: world-1
    name: World Builder
    specialty: world
    provider: openai/gpt-4o
    enabled: false
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn parses_sample_document() {
        let config = InkwellConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.initial_backoff_ms, 500);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].limits.max_tokens, 2048);
        assert_eq!(config.agents.len(), 2);
        assert!(!config.agents[1].enabled);
        assert_eq!(config.history_window, HISTORY_WINDOW);
        config.validate().unwrap();
    }

    #[test]
    fn empty_document_is_default() {
        let config = InkwellConfig::from_yaml_str("  \n").unwrap();
        assert_eq!(config, InkwellConfig::default());
    }

    #[test]
    fn env_fills_missing_credentials_only() {
        let mut config = InkwellConfig::from_yaml_str(SAMPLE).unwrap();
        config
            .apply_env_with(env(&[
                ("ANTHROPIC_API_KEY", "sk-ant-env"),
                ("OPENAI_API_KEY", "sk-openai-env"),
                ("ANTHROPIC_BASE_URL", "http://proxy.local"),
            ]))
            .unwrap();

        assert_eq!(config.providers[0].api_key.as_deref(), Some("sk-ant-env"));
        assert_eq!(config.providers[0].base_url.as_deref(), Some("http://proxy.local"));
        assert_eq!(config.providers[1].api_key.as_deref(), Some("sk-from-file"));
    }

    #[test]
    fn env_default_provider_adds_descriptor() {
        let mut config = InkwellConfig::default();
        config
            .apply_env_with(env(&[(DEFAULT_PROVIDER_ENV, "gemini"), ("GEMINI_API_KEY", "g-key")]))
            .unwrap();

        let key = config.default_provider.clone().unwrap();
        assert_eq!(key.kind, ProviderKind::Gemini);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].api_key.as_deref(), Some("g-key"));
        config.validate().unwrap();
    }

    #[test]
    fn env_rejects_bad_default_provider() {
        let mut config = InkwellConfig::default();
        let err = config
            .apply_env_with(env(&[(DEFAULT_PROVIDER_ENV, "nonsense")]))
            .unwrap_err();
        assert!(err.to_string().contains(DEFAULT_PROVIDER_ENV));
    }

    #[test]
    fn default_roster_when_no_agents() {
        let config = InkwellConfig {
            providers: vec![ProviderDescriptor::new(ProviderKind::OpenAi, "gpt-4o")],
            ..InkwellConfig::default()
        };
        let agents = config.resolved_agents();
        assert_eq!(agents.len(), Specialty::ALL.len());
        assert!(agents.iter().all(|a| a.provider.kind == ProviderKind::OpenAi));
    }

    #[test]
    fn validate_catches_bad_references() {
        let mut config = InkwellConfig::from_yaml_str(SAMPLE).unwrap();
        config.agents[0].provider = "gemini/none".parse().unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownAgentProvider { .. })
        ));

        let mut config = InkwellConfig::from_yaml_str(SAMPLE).unwrap();
        config.agents[1].id = "theme-1".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateAgent(_))));

        let mut config = InkwellConfig::from_yaml_str(SAMPLE).unwrap();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroAttempts)));
    }

    #[test]
    fn configured_workflow_replaces_builtin() {
        let mut config = InkwellConfig::default();
        config.workflows.push(WorkflowDefinition::new(
            "chapter_review",
            "Custom Review",
            vec![crate::workflow::WorkflowStep::new("plot", Specialty::Plot, "review")],
        ));
        let workflows = config.resolved_workflows();
        let review: Vec<_> = workflows.iter().filter(|w| w.id == "chapter_review").collect();
        assert_eq!(review.len(), 1);
        assert_eq!(review[0].name, "Custom Review");
        assert_eq!(workflows.len(), WorkflowDefinition::builtin().len());
    }
}
