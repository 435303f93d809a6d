// ABOUTME: Core library for inkwell, containing the domain types shared by every crate.
// ABOUTME: Specialties, descriptors, contexts, outputs, workflows, sessions, records, errors, config.

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod output;
pub mod provider;
pub mod record;
pub mod session;
pub mod specialty;
pub mod workflow;

pub use agent::{AgentDescriptor, AgentSummary};
pub use config::{ConfigError, InkwellConfig, RetrySettings};
pub use context::{AgentContext, ConversationTurn, HISTORY_WINDOW, TurnRole};
pub use error::{ConfigurationError, ProviderError, ProviderErrorCode};
pub use output::AgentOutput;
pub use provider::{ProviderDescriptor, ProviderKey, ProviderKind, RequestLimits};
pub use record::ConversationRecord;
pub use session::{CollaborationMessage, CollaborationSession, SessionError, SessionStatus};
pub use specialty::Specialty;
pub use workflow::{WorkflowDefinition, WorkflowError, WorkflowStep};
