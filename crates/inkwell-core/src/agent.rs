// ABOUTME: Defines AgentDescriptor, the configuration record for one specialty agent.
// ABOUTME: Also provides AgentSummary (the listing shape) and the default seven-agent roster.

use serde::{Deserialize, Serialize};

use crate::provider::{ProviderKey, RequestLimits};
use crate::specialty::Specialty;

/// Configuration for a single agent: who it is, what it does, and which
/// backend answers for it. Descriptors are never deleted, only disabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    pub specialty: Specialty,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prompt_template: String,
    pub provider: ProviderKey,
    /// Overrides the provider's limits for this agent only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<RequestLimits>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl AgentDescriptor {
    /// Create an enabled descriptor with a blank template (the specialty default applies).
    pub fn new(id: impl Into<String>, specialty: Specialty, provider: ProviderKey) -> Self {
        Self {
            id: id.into(),
            name: specialty.title().to_string(),
            specialty,
            description: String::new(),
            prompt_template: String::new(),
            provider,
            limits: None,
            enabled: true,
        }
    }

    /// One enabled agent per specialty, all bound to the given provider.
    /// Ids follow the `<specialty>-agent` pattern.
    pub fn default_roster(provider: &ProviderKey) -> Vec<AgentDescriptor> {
        Specialty::ALL
            .into_iter()
            .map(|specialty| {
                let mut desc =
                    AgentDescriptor::new(format!("{}-agent", specialty), specialty, provider.clone());
                desc.description = format!("Default {} agent", specialty.title().to_lowercase());
                desc
            })
            .collect()
    }

    pub fn summary(&self) -> AgentSummary {
        AgentSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            specialty: self.specialty,
            description: self.description.clone(),
            provider: self.provider.to_string(),
            enabled: self.enabled,
        }
    }
}

/// The caller-facing listing of an agent, without its prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    pub specialty: Specialty,
    pub description: String,
    pub provider: String,
    pub enabled: bool,
}
