// ABOUTME: Defines ConversationRecord, the persisted log entry for one agent dispatch.
// ABOUTME: Records are append-only; identical requests produce distinct records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::context::ConversationTurn;
use crate::output::AgentOutput;
use crate::specialty::Specialty;

/// One dispatch as stored in the collaboration log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub record_id: Ulid,
    pub project_id: String,
    pub agent_id: String,
    pub specialty: Specialty,
    pub user_input: String,
    pub output: AgentOutput,
    pub created_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// Create a record with a fresh ULID and current timestamp.
    pub fn new(
        project_id: impl Into<String>,
        agent_id: impl Into<String>,
        specialty: Specialty,
        user_input: impl Into<String>,
        output: AgentOutput,
    ) -> Self {
        Self {
            record_id: Ulid::new(),
            project_id: project_id.into(),
            agent_id: agent_id.into(),
            specialty,
            user_input: user_input.into(),
            output,
            created_at: Utc::now(),
        }
    }

    /// Expand the record into the user turn and the agent turn it represents.
    pub fn to_turns(&self) -> [ConversationTurn; 2] {
        let mut user = ConversationTurn::user(self.user_input.clone());
        let mut agent = ConversationTurn::agent(self.output.content.clone());
        user.timestamp = self.created_at;
        agent.timestamp = self.created_at;
        [user, agent]
    }
}
