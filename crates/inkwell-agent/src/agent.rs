// ABOUTME: The Agent contract: a descriptor composed with a specialty strategy of three functions.
// ABOUTME: Builds prompts, dispatches through the gateway, parses replies, and reacts to collaboration messages.

use inkwell_core::{AgentContext, AgentDescriptor, AgentOutput, CollaborationMessage, ProviderError, Specialty};

use crate::backend::ModelRequest;
use crate::gateway::ProviderGateway;
use crate::parse::{ParsedResponse, ResponseParser};

/// Turns a context into the user prompt for this agent.
pub type PromptBuilder = fn(&AgentDescriptor, &AgentContext, &ResponseParser) -> String;

/// Turns a parsed reply into the agent's output.
pub type OutputShaper = fn(&AgentDescriptor, ParsedResponse) -> AgentOutput;

/// Decides whether to react to a collaboration message; returns the prompt to send if so.
pub type CollaborationHandler =
    fn(&AgentDescriptor, &CollaborationMessage, &AgentContext, &ResponseParser) -> Option<String>;

/// The behavior that distinguishes one specialty from another.
#[derive(Clone, Copy)]
pub struct SpecialtyStrategy {
    pub build_prompt: PromptBuilder,
    pub shape_output: OutputShaper,
    pub on_collaboration: CollaborationHandler,
}

/// A live agent. Cheap to share behind an `Arc`; holds no mutable state.
pub struct Agent {
    descriptor: AgentDescriptor,
    strategy: SpecialtyStrategy,
    parser: ResponseParser,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.descriptor.id)
            .field("specialty", &self.descriptor.specialty)
            .field("provider", &self.descriptor.provider)
            .finish()
    }
}

impl Agent {
    pub fn new(descriptor: AgentDescriptor, strategy: SpecialtyStrategy) -> Self {
        Self {
            descriptor,
            strategy,
            parser: ResponseParser::default(),
        }
    }

    /// Use different section markers for this agent's replies.
    pub fn with_parser(mut self, parser: ResponseParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn specialty(&self) -> Specialty {
        self.descriptor.specialty
    }

    pub fn build_prompt(&self, context: &AgentContext) -> String {
        (self.strategy.build_prompt)(&self.descriptor, context, &self.parser)
    }

    pub fn system_prompt(&self) -> String {
        let mut system = format!(
            "You are {}, the {} on a creative writing team.",
            self.descriptor.name,
            self.descriptor.specialty.title()
        );
        if !self.descriptor.description.is_empty() {
            system.push(' ');
            system.push_str(&self.descriptor.description);
        }
        system
    }

    fn request(&self, prompt: String) -> ModelRequest {
        let request = ModelRequest::prompt(prompt).with_system(self.system_prompt());
        match self.descriptor.limits {
            Some(limits) => request.with_limits(limits),
            None => request,
        }
    }

    /// Parse and shape raw reply text into this agent's output.
    pub fn interpret(&self, text: &str) -> AgentOutput {
        (self.strategy.shape_output)(&self.descriptor, self.parser.parse(text))
    }

    /// Dispatch and surface provider failures to the caller.
    pub async fn try_dispatch(
        &self,
        gateway: &ProviderGateway,
        context: &AgentContext,
    ) -> Result<AgentOutput, ProviderError> {
        let prompt = self.build_prompt(context);
        let reply = gateway
            .send(&self.request(prompt), Some(&self.descriptor.provider))
            .await?;
        tracing::info!(
            agent = %self.descriptor.id,
            provider = %reply.served_by,
            fallback = reply.used_fallback,
            "agent dispatched"
        );
        Ok(self.interpret(&reply.response.text))
    }

    /// Dispatch; any failure becomes a degraded output instead of an error.
    pub async fn dispatch(&self, gateway: &ProviderGateway, context: &AgentContext) -> AgentOutput {
        match self.try_dispatch(gateway, context).await {
            Ok(output) => output,
            Err(e) => self.degraded(&e),
        }
    }

    /// React to a message posted in a collaboration session. Returns None when
    /// the message is this agent's own, addressed to someone else, or outside its interests.
    pub async fn on_collaboration_message(
        &self,
        gateway: &ProviderGateway,
        message: &CollaborationMessage,
        context: &AgentContext,
    ) -> Option<AgentOutput> {
        if message.from_agent == self.descriptor.id || !message.is_for(&self.descriptor.id) {
            return None;
        }
        let prompt = (self.strategy.on_collaboration)(&self.descriptor, message, context, &self.parser)?;

        let output = match gateway
            .send(&self.request(prompt), Some(&self.descriptor.provider))
            .await
        {
            Ok(reply) => self.interpret(&reply.response.text),
            Err(e) => self.degraded(&e),
        };
        Some(output)
    }

    pub(crate) fn degraded(&self, err: &ProviderError) -> AgentOutput {
        tracing::error!(agent = %self.descriptor.id, error = %err, "agent dispatch failed");
        AgentOutput::degraded(format!(
            "{} ({}) could not complete the request: {}",
            self.descriptor.name, self.descriptor.id, err
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::specialties;
    use crate::testing::ScriptedBackend;
    use inkwell_core::{ProviderErrorCode, ProviderKey, ProviderKind, RequestLimits};
    use std::sync::Arc;

    fn key() -> ProviderKey {
        ProviderKey::new(ProviderKind::Ollama, "llama3.1")
    }

    fn agent(specialty: Specialty) -> Agent {
        let descriptor = AgentDescriptor::new(format!("{}-agent", specialty), specialty, key());
        Agent::new(descriptor, specialties::strategy_for(specialty))
    }

    fn gateway(backend: Arc<ScriptedBackend>) -> ProviderGateway {
        let mut gateway = ProviderGateway::new(RetryPolicy::no_retry());
        gateway.register(key(), backend);
        gateway
    }

    #[tokio::test]
    async fn dispatch_without_data_section_keeps_full_text() {
        let reply = "The heart of this story is forgiveness.";
        let gw = gateway(Arc::new(ScriptedBackend::replying(reply)));
        let output = agent(Specialty::Theme)
            .dispatch(&gw, &AgentContext::new("novel", "What is this about?"))
            .await;

        assert_eq!(output.content, reply);
        assert!(output.has_empty_data());
        assert_eq!(output.confidence(), 0.7);
    }

    #[tokio::test]
    async fn dispatch_failure_is_degraded() {
        let gw = gateway(Arc::new(ScriptedBackend::failing(ProviderErrorCode::Authentication)));
        let output = agent(Specialty::World)
            .dispatch(&gw, &AgentContext::new("novel", "Build a city"))
            .await;

        assert_eq!(output.confidence(), 0.0);
        assert!(output.needs_follow_up);
        assert!(output.has_empty_data());
        assert!(output.content.contains("world-agent"));
        assert!(output.content.contains("authentication"));
    }

    #[tokio::test]
    async fn try_dispatch_surfaces_provider_error() {
        let gw = gateway(Arc::new(ScriptedBackend::failing(ProviderErrorCode::BadRequest)));
        let err = agent(Specialty::Plot)
            .try_dispatch(&gw, &AgentContext::new("novel", "Review"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderErrorCode::BadRequest);
    }

    #[tokio::test]
    async fn descriptor_limits_reach_the_backend() {
        let backend = Arc::new(ScriptedBackend::replying("ok"));
        let gw = gateway(backend.clone());
        let mut descriptor = AgentDescriptor::new("terse", Specialty::Dialogue, key());
        descriptor.limits = Some(RequestLimits {
            max_tokens: 200,
            temperature: 0.2,
        });
        let agent = Agent::new(descriptor, specialties::strategy_for(Specialty::Dialogue));

        agent.dispatch(&gw, &AgentContext::new("novel", "Tighten this")).await;

        let request = backend.last_request().unwrap();
        assert_eq!(request.limits.unwrap().max_tokens, 200);
        assert!(request.system.contains("Dialogue Stylist"));
    }

    #[tokio::test]
    async fn ignores_own_and_misaddressed_messages() {
        let backend = Arc::new(ScriptedBackend::replying("noted"));
        let gw = gateway(backend.clone());
        let character = agent(Specialty::Character);
        let ctx = AgentContext::new("novel", "the heist");

        let own = CollaborationMessage::new("character-agent", "my idea");
        assert!(character.on_collaboration_message(&gw, &own, &ctx).await.is_none());

        let elsewhere = CollaborationMessage::new("world-agent", "for plot only")
            .with_specialty(Specialty::World)
            .to("plot-agent");
        assert!(character.on_collaboration_message(&gw, &elsewhere, &ctx).await.is_none());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn reacts_to_interesting_messages() {
        let gw = gateway(Arc::new(ScriptedBackend::replying("Mara would hate the cold.")));
        let character = agent(Specialty::Character);
        let message = CollaborationMessage::new("world-agent", "The city is frozen year round")
            .with_specialty(Specialty::World);

        let reply = character
            .on_collaboration_message(&gw, &message, &AgentContext::new("novel", "the heist"))
            .await
            .unwrap();
        assert_eq!(reply.content, "Mara would hate the cold.");
    }
}
