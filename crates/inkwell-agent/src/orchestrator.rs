// ABOUTME: Orchestration facade: the single entry point for sending messages, running workflows,
// ABOUTME: collaboration sessions, and batches. Owns the registry, gateway, workflows, and store handle.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::StreamExt;
use futures::future::join_all;
use futures::stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

use inkwell_core::{
    AgentContext, AgentDescriptor, AgentOutput, AgentSummary, CollaborationMessage, CollaborationSession,
    ConfigurationError, ConversationRecord, ConversationTurn, HISTORY_WINDOW, InkwellConfig, ProviderError,
    ProviderKey, RequestLimits, SessionError, Specialty, WorkflowDefinition,
};
use inkwell_store::{CollaborationStore, StoreError};

use crate::agent::Agent;
use crate::backend::ModelRequest;
use crate::engine::{ExecutionMode, WorkflowEngine, WorkflowReport};
use crate::gateway::ProviderGateway;
use crate::registry::{AgentFactory, AgentRegistry};
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// One item of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub agent_id: String,
    pub context: AgentContext,
}

impl BatchRequest {
    pub fn new(agent_id: impl Into<String>, context: AgentContext) -> Self {
        Self {
            agent_id: agent_id.into(),
            context,
        }
    }
}

/// Outcome of one batch item: exactly one of `output` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<AgentOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchResult {
    pub fn is_ok(&self) -> bool {
        self.output.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub success: bool,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    fn from_outcome<T>(started: Instant, outcome: Result<T, ProviderError>) -> Self {
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(_) => Self {
                success: true,
                latency_ms,
                error: None,
            },
            Err(e) => Self {
                success: false,
                latency_ms,
                error: Some(e.to_string()),
            },
        }
    }
}

const PROVIDER_PROBE: &str = "Reply with the single word: ready";

pub struct Orchestrator {
    /// Every known agent, enabled or not. Live instances are in `registry`.
    descriptors: Vec<AgentDescriptor>,
    factory: AgentFactory,
    registry: AgentRegistry,
    gateway: ProviderGateway,
    workflows: Vec<WorkflowDefinition>,
    store: Arc<dyn CollaborationStore>,
    engine: WorkflowEngine,
    history_window: usize,
    /// Serializes load-change-save cycles on stored sessions.
    session_writes: Mutex<()>,
}

impl Orchestrator {
    /// An orchestrator with no agents and the built-in workflows.
    pub fn new(gateway: ProviderGateway, store: Arc<dyn CollaborationStore>) -> Self {
        Self {
            descriptors: Vec::new(),
            factory: AgentFactory::default(),
            registry: AgentRegistry::new(),
            gateway,
            workflows: WorkflowDefinition::builtin(),
            store,
            engine: WorkflowEngine::default(),
            history_window: HISTORY_WINDOW,
            session_writes: Mutex::new(()),
        }
    }

    /// Build everything a configuration document describes. Providers that
    /// cannot be constructed (missing keys) are left out of the gateway.
    pub fn from_config(
        config: &InkwellConfig,
        store: Arc<dyn CollaborationStore>,
    ) -> Result<Self, OrchestratorError> {
        config
            .validate()
            .map_err(|e| ConfigurationError::Invalid(e.to_string()))?;

        let gateway = ProviderGateway::from_descriptors(
            &config.providers,
            config.default_provider.clone(),
            RetryPolicy::from(config.retry),
        );
        let mut orchestrator = Self::new(gateway, store);
        orchestrator.workflows = config.resolved_workflows();
        orchestrator.history_window = config.history_window;
        for descriptor in config.resolved_agents() {
            orchestrator.add_agent(descriptor);
        }

        tracing::info!(
            agents = orchestrator.registry.len(),
            providers = orchestrator.gateway.keys().len(),
            workflows = orchestrator.workflows.len(),
            "orchestrator ready"
        );
        Ok(orchestrator)
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.engine = WorkflowEngine::new(mode);
        self
    }

    /// Swap the agent factory. Applies to agents added or re-enabled afterwards.
    pub fn with_factory(mut self, factory: AgentFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Add an agent, replacing any agent with the same id.
    pub fn add_agent(&mut self, descriptor: AgentDescriptor) {
        match self.descriptors.iter_mut().find(|d| d.id == descriptor.id) {
            Some(existing) => *existing = descriptor.clone(),
            None => self.descriptors.push(descriptor.clone()),
        }
        self.sync_live(descriptor);
    }

    pub fn enable_agent(&mut self, agent_id: &str) -> Result<(), OrchestratorError> {
        let descriptor = self.descriptor_mut(agent_id)?;
        descriptor.enabled = true;
        let descriptor = descriptor.clone();
        self.sync_live(descriptor);
        tracing::info!(agent = %agent_id, "agent enabled");
        Ok(())
    }

    pub fn disable_agent(&mut self, agent_id: &str) -> Result<(), OrchestratorError> {
        let descriptor = self.descriptor_mut(agent_id)?;
        descriptor.enabled = false;
        let descriptor = descriptor.clone();
        self.sync_live(descriptor);
        tracing::info!(agent = %agent_id, "agent disabled");
        Ok(())
    }

    /// Replace an existing agent's descriptor. The id must already be known.
    pub fn update_agent(&mut self, descriptor: AgentDescriptor) -> Result<(), OrchestratorError> {
        let existing = self.descriptor_mut(&descriptor.id)?;
        *existing = descriptor.clone();
        self.sync_live(descriptor);
        Ok(())
    }

    fn descriptor_mut(&mut self, agent_id: &str) -> Result<&mut AgentDescriptor, ConfigurationError> {
        self.descriptors
            .iter_mut()
            .find(|d| d.id == agent_id)
            .ok_or_else(|| ConfigurationError::UnknownAgent(agent_id.to_string()))
    }

    fn sync_live(&mut self, descriptor: AgentDescriptor) {
        if descriptor.enabled {
            self.registry.register(self.factory.build(descriptor));
        } else {
            self.registry.unregister(&descriptor.id);
        }
    }

    /// Enabled agents, in registration order.
    pub fn list_available_agents(&self) -> Vec<AgentSummary> {
        self.registry.list_enabled()
    }

    pub fn list_all_agents(&self) -> Vec<AgentSummary> {
        self.descriptors.iter().map(AgentDescriptor::summary).collect()
    }

    /// Add or replace a workflow after validating it.
    pub fn register_workflow(&mut self, definition: WorkflowDefinition) -> Result<(), OrchestratorError> {
        definition.validate().map_err(ConfigurationError::from)?;
        match self.workflows.iter_mut().find(|w| w.id == definition.id) {
            Some(existing) => *existing = definition,
            None => self.workflows.push(definition),
        }
        Ok(())
    }

    pub fn list_workflows(&self) -> &[WorkflowDefinition] {
        &self.workflows
    }

    pub fn gateway(&self) -> &ProviderGateway {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut ProviderGateway {
        &mut self.gateway
    }

    pub fn store(&self) -> &Arc<dyn CollaborationStore> {
        &self.store
    }

    fn live_agent(&self, agent_id: &str) -> Result<Arc<Agent>, ConfigurationError> {
        let descriptor = self
            .descriptors
            .iter()
            .find(|d| d.id == agent_id)
            .ok_or_else(|| ConfigurationError::UnknownAgent(agent_id.to_string()))?;
        if !descriptor.enabled {
            return Err(ConfigurationError::AgentDisabled(agent_id.to_string()));
        }
        self.registry
            .resolve_by_id(agent_id)
            .ok_or_else(|| ConfigurationError::UnknownAgent(agent_id.to_string()))
    }

    /// Send one message to one agent. Provider failures come back as a
    /// degraded output; only configuration problems are errors.
    pub async fn send_message(
        &self,
        agent_id: &str,
        context: AgentContext,
    ) -> Result<AgentOutput, OrchestratorError> {
        let agent = self.live_agent(agent_id)?;
        Ok(self.converse(&agent, context).await)
    }

    /// Send to the first enabled agent of a specialty.
    pub async fn send_to_specialty(
        &self,
        specialty: Specialty,
        context: AgentContext,
    ) -> Result<AgentOutput, OrchestratorError> {
        let agent = self
            .registry
            .resolve_by_specialty(specialty)
            .ok_or(ConfigurationError::NoAgentForSpecialty(specialty))?;
        Ok(self.converse(&agent, context).await)
    }

    async fn converse(&self, agent: &Agent, context: AgentContext) -> AgentOutput {
        let user_input = context.user_input.clone();
        let context = self.enrich(agent, context);
        let output = agent.dispatch(&self.gateway, &context).await;
        self.record(agent, &context.project_id, &user_input, &output);
        output
    }

    /// Fill in stored shared data (explicit entries win) and, when the caller
    /// sent no history, the agent's recent conversation in this project.
    fn enrich(&self, agent: &Agent, mut context: AgentContext) -> AgentContext {
        match self.store.shared_data(&context.project_id) {
            Ok(shared) => context.merge_collaboration(shared),
            Err(e) => tracing::warn!(project = %context.project_id, error = %e, "could not load shared data"),
        }

        if context.history().is_empty() && self.history_window > 0 {
            match self
                .store
                .recent_records(&context.project_id, agent.id(), self.history_window)
            {
                Ok(records) => {
                    let turns: Vec<ConversationTurn> = records.iter().flat_map(|r| r.to_turns()).collect();
                    context.set_history(turns);
                }
                Err(e) => tracing::warn!(agent = %agent.id(), error = %e, "could not load history"),
            }
        }
        context
    }

    fn record(&self, agent: &Agent, project_id: &str, user_input: &str, output: &AgentOutput) {
        let record = ConversationRecord::new(project_id, agent.id(), agent.specialty(), user_input, output.clone());
        if let Err(e) = self.store.append_record(&record) {
            tracing::error!(agent = %agent.id(), error = %e, "failed to append conversation record");
        }
    }

    fn publish(&self, agent: &Agent, project_id: &str, output: &AgentOutput) {
        if output.has_empty_data() {
            return;
        }
        if let Err(e) = self
            .store
            .put_shared_data(project_id, agent.specialty(), agent.id(), &output.data)
        {
            tracing::error!(agent = %agent.id(), error = %e, "failed to publish shared data");
        }
    }

    /// Run a registered workflow. Every executed step is recorded; completed
    /// steps also publish their data for the project.
    pub async fn run_workflow(
        &self,
        workflow_id: &str,
        context: AgentContext,
    ) -> Result<WorkflowReport, OrchestratorError> {
        let definition = self
            .workflows
            .iter()
            .find(|w| w.id == workflow_id)
            .ok_or_else(|| ConfigurationError::UnknownWorkflow(workflow_id.to_string()))?;

        let mut context = context;
        match self.store.shared_data(&context.project_id) {
            Ok(shared) => context.merge_collaboration(shared),
            Err(e) => tracing::warn!(project = %context.project_id, error = %e, "could not load shared data"),
        }

        let report = self
            .engine
            .execute(definition, &context, &self.registry, &self.gateway)
            .await
            .map_err(ConfigurationError::from)?;

        for step in &report.executed {
            let (Some(agent), Some(output)) = (
                self.registry.resolve_by_id(&step.agent_id),
                report.outputs.get(&step.step_id),
            ) else {
                continue;
            };
            self.record(&agent, &context.project_id, &step.user_input, output);
            if step.completed {
                self.publish(&agent, &context.project_id, output);
            }
        }
        Ok(report)
    }

    /// Open a session with the first enabled agent of each specialty.
    pub fn start_collaboration(
        &self,
        project_id: &str,
        topic: &str,
        specialties: &[Specialty],
    ) -> Result<Ulid, OrchestratorError> {
        let mut participants: Vec<String> = Vec::new();
        for specialty in specialties {
            let agent = self
                .registry
                .resolve_by_specialty(*specialty)
                .ok_or(ConfigurationError::NoAgentForSpecialty(*specialty))?;
            if !participants.iter().any(|p| p == agent.id()) {
                participants.push(agent.id().to_string());
            }
        }

        let session = CollaborationSession::new(project_id, topic, participants);
        self.store.save_session(&session)?;
        tracing::info!(session = %session.id, project = %project_id, topic = %topic, "collaboration started");
        Ok(session.id)
    }

    /// Post a message to a session and let every other live participant react
    /// once. Returns the replies in participant order.
    pub async fn collaborate(
        &self,
        session_id: &Ulid,
        message: CollaborationMessage,
    ) -> Result<Vec<CollaborationMessage>, OrchestratorError> {
        // The posted message is stored before any model call so that rounds
        // running at the same time never overwrite each other's messages.
        let session = self.update_session(session_id, |session| {
            session.append(message.clone())?;
            Ok(())
        })?;

        let mut context = AgentContext::new(session.project_id.clone(), session.topic.clone());
        match self.store.shared_data(&session.project_id) {
            Ok(shared) => context.merge_collaboration(shared),
            Err(e) => tracing::warn!(project = %session.project_id, error = %e, "could not load shared data"),
        }

        let agents: Vec<Arc<Agent>> = session
            .participants
            .iter()
            .filter(|id| **id != message.from_agent)
            .filter_map(|id| self.registry.resolve_by_id(id))
            .collect();
        let reactions = join_all(
            agents
                .iter()
                .map(|agent| agent.on_collaboration_message(&self.gateway, &message, &context)),
        )
        .await;

        let mut replies = Vec::new();
        for (agent, reaction) in agents.iter().zip(reactions) {
            let Some(output) = reaction else {
                continue;
            };
            self.record(agent, &session.project_id, &message.content, &output);
            replies.push(
                CollaborationMessage::new(agent.id(), output.content.clone())
                    .with_specialty(agent.specialty())
                    .with_data(output.data.clone())
                    .to(message.from_agent.clone()),
            );
        }

        if !replies.is_empty() {
            self.update_session(session_id, |session| {
                for reply in &replies {
                    session.append(reply.clone())?;
                }
                Ok(())
            })?;
        }
        tracing::info!(session = %session_id, replies = replies.len(), "collaboration round finished");
        Ok(replies)
    }

    pub fn pause_session(&self, session_id: &Ulid) -> Result<(), OrchestratorError> {
        self.transition(session_id, CollaborationSession::pause)
    }

    pub fn resume_session(&self, session_id: &Ulid) -> Result<(), OrchestratorError> {
        self.transition(session_id, CollaborationSession::resume)
    }

    pub fn complete_session(&self, session_id: &Ulid) -> Result<(), OrchestratorError> {
        self.transition(session_id, CollaborationSession::complete)
    }

    fn transition(
        &self,
        session_id: &Ulid,
        change: fn(&mut CollaborationSession) -> Result<(), SessionError>,
    ) -> Result<(), OrchestratorError> {
        let session = self.update_session(session_id, |session| Ok(change(session)?))?;
        tracing::info!(session = %session_id, status = session.status.label(), "session status changed");
        Ok(())
    }

    /// Reload a session, apply `change` and save it while holding the write
    /// lock. Never held across an await.
    fn update_session(
        &self,
        session_id: &Ulid,
        change: impl FnOnce(&mut CollaborationSession) -> Result<(), OrchestratorError>,
    ) -> Result<CollaborationSession, OrchestratorError> {
        let _guard = self.session_writes.lock().map_err(|_| StoreError::Poisoned)?;
        let mut session = self.load_session(session_id)?;
        change(&mut session)?;
        self.store.save_session(&session)?;
        Ok(session)
    }

    fn load_session(&self, session_id: &Ulid) -> Result<CollaborationSession, OrchestratorError> {
        self.store
            .load_session(session_id)?
            .ok_or_else(|| ConfigurationError::UnknownSession(session_id.to_string()).into())
    }

    pub fn session(&self, session_id: &Ulid) -> Result<Option<CollaborationSession>, OrchestratorError> {
        Ok(self.store.load_session(session_id)?)
    }

    pub fn list_sessions(&self, project_id: &str) -> Result<Vec<CollaborationSession>, OrchestratorError> {
        Ok(self.store.list_sessions(project_id)?)
    }

    /// Run every request concurrently. Results line up with the requests;
    /// a failing item never affects the others.
    pub async fn batch_process(&self, requests: Vec<BatchRequest>) -> Vec<BatchResult> {
        join_all(requests.into_iter().map(|r| self.batch_item(r))).await
    }

    /// Like `batch_process`, with at most `limit` items in flight.
    pub async fn batch_process_with_limit(&self, requests: Vec<BatchRequest>, limit: usize) -> Vec<BatchResult> {
        stream::iter(requests)
            .map(|r| self.batch_item(r))
            .buffered(limit.max(1))
            .collect()
            .await
    }

    async fn batch_item(&self, request: BatchRequest) -> BatchResult {
        let BatchRequest { agent_id, context } = request;
        let agent = match self.live_agent(&agent_id) {
            Ok(agent) => agent,
            Err(e) => {
                tracing::warn!(agent = %agent_id, error = %e, "batch item rejected");
                return BatchResult {
                    agent_id,
                    output: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let user_input = context.user_input.clone();
        let context = self.enrich(&agent, context);
        match agent.try_dispatch(&self.gateway, &context).await {
            Ok(output) => {
                self.record(&agent, &context.project_id, &user_input, &output);
                BatchResult {
                    agent_id,
                    output: Some(output),
                    error: None,
                }
            }
            Err(e) => {
                self.record(&agent, &context.project_id, &user_input, &agent.degraded(&e));
                BatchResult {
                    agent_id,
                    output: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Dispatch a sample context to an agent and time it. Nothing is recorded.
    pub async fn test_agent(&self, agent_id: &str, sample: &AgentContext) -> Result<ProbeResult, OrchestratorError> {
        let agent = self.live_agent(agent_id)?;
        let started = Instant::now();
        let outcome = agent.try_dispatch(&self.gateway, sample).await;
        Ok(ProbeResult::from_outcome(started, outcome))
    }

    /// Send a tiny prompt straight to one backend, without fallback.
    pub async fn test_provider(&self, key: &ProviderKey) -> Result<ProbeResult, OrchestratorError> {
        if !self.gateway.contains(key) {
            return Err(ConfigurationError::UnknownProvider(key.to_string()).into());
        }
        let request = ModelRequest::prompt(PROVIDER_PROBE).with_limits(RequestLimits {
            max_tokens: 16,
            ..RequestLimits::default()
        });
        let started = Instant::now();
        let outcome = self.gateway.send_to(&request, key).await;
        Ok(ProbeResult::from_outcome(started, outcome))
    }
}
