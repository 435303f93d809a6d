// ABOUTME: Agent registry holding the live (enabled) agents, plus the specialty-to-constructor factory.
// ABOUTME: Lookups are by id or by specialty; the first registered agent wins a specialty lookup.

use std::collections::HashMap;
use std::sync::Arc;

use inkwell_core::{AgentDescriptor, AgentSummary, Specialty};

use crate::agent::Agent;
use crate::specialties;

/// Builds an agent from its descriptor.
pub type AgentConstructor = fn(AgentDescriptor) -> Agent;

fn build_default(descriptor: AgentDescriptor) -> Agent {
    let strategy = specialties::strategy_for(descriptor.specialty);
    Agent::new(descriptor, strategy)
}

/// Maps each specialty to the constructor that builds its agents.
pub struct AgentFactory {
    constructors: HashMap<Specialty, AgentConstructor>,
}

impl Default for AgentFactory {
    fn default() -> Self {
        let constructors = Specialty::ALL
            .into_iter()
            .map(|s| (s, build_default as AgentConstructor))
            .collect();
        Self { constructors }
    }
}

impl AgentFactory {
    /// Replace the constructor for one specialty.
    pub fn register(&mut self, specialty: Specialty, constructor: AgentConstructor) {
        self.constructors.insert(specialty, constructor);
    }

    pub fn build(&self, descriptor: AgentDescriptor) -> Agent {
        let constructor = self
            .constructors
            .get(&descriptor.specialty)
            .copied()
            .unwrap_or(build_default);
        constructor(descriptor)
    }
}

/// The set of agents that can currently be dispatched to, in registration order.
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent. An agent with the same id is replaced in place.
    pub fn register(&mut self, agent: Agent) {
        let agent = Arc::new(agent);
        match self.agents.iter_mut().find(|a| a.id() == agent.id()) {
            Some(existing) => *existing = agent,
            None => self.agents.push(agent),
        }
    }

    pub fn unregister(&mut self, id: &str) -> Option<Arc<Agent>> {
        let index = self.agents.iter().position(|a| a.id() == id)?;
        Some(self.agents.remove(index))
    }

    pub fn list_enabled(&self) -> Vec<AgentSummary> {
        self.agents
            .iter()
            .filter(|a| a.descriptor().enabled)
            .map(|a| a.descriptor().summary())
            .collect()
    }

    pub fn resolve_by_id(&self, id: &str) -> Option<Arc<Agent>> {
        self.agents
            .iter()
            .find(|a| a.id() == id && a.descriptor().enabled)
            .cloned()
    }

    pub fn resolve_by_specialty(&self, specialty: Specialty) -> Option<Arc<Agent>> {
        self.agents
            .iter()
            .find(|a| a.specialty() == specialty && a.descriptor().enabled)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
