// ABOUTME: Agent runtime for inkwell: LLM backends, provider gateway, specialty agents, and orchestration.
// ABOUTME: The Orchestrator is the entry point; the rest is exposed for embedding and tests.

pub mod agent;
pub mod backend;
pub mod engine;
pub mod gateway;
pub mod orchestrator;
pub mod parse;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod specialties;
pub mod testing;

pub use agent::{Agent, SpecialtyStrategy};
pub use backend::{ChatMessage, ChatRole, ModelBackend, ModelRequest, ModelResponse, TokenUsage};
pub use engine::{ExecutedStep, ExecutionMode, SkipReason, SkippedStep, WorkflowEngine, WorkflowReport};
pub use gateway::{GatewayResponse, ProviderGateway};
pub use orchestrator::{BatchRequest, BatchResult, Orchestrator, OrchestratorError, ProbeResult};
pub use parse::{DataSection, ParseError, ParsedResponse, ResponseParser, SectionMarkers};
pub use providers::create_backend;
pub use registry::{AgentConstructor, AgentFactory, AgentRegistry};
pub use retry::RetryPolicy;
