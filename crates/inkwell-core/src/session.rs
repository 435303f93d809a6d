// ABOUTME: Defines free-form collaboration sessions between several agents on one topic.
// ABOUTME: Sessions only grow by appending messages; completed sessions are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use ulid::Ulid;

use crate::specialty::Specialty;

/// Lifecycle state of a collaboration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
}

impl SessionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors from session state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session {id} is {status}; cannot {action}")]
    InvalidTransition {
        id: Ulid,
        status: SessionStatus,
        action: &'static str,
    },
}

/// A message exchanged between agents within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationMessage {
    pub message_id: Ulid,
    pub from_agent: String,
    /// Specialty of the sending agent; None for messages from a person.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_specialty: Option<Specialty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_agent: Option<String>,
    pub content: String,
    #[serde(default)]
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl CollaborationMessage {
    /// Create a broadcast message with a fresh ULID and current timestamp.
    pub fn new(from_agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            message_id: Ulid::new(),
            from_agent: from_agent.into(),
            from_specialty: None,
            to_agent: None,
            content: content.into(),
            data: Value::Object(Map::new()),
            timestamp: Utc::now(),
        }
    }

    pub fn to(mut self, agent_id: impl Into<String>) -> Self {
        self.to_agent = Some(agent_id.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_specialty(mut self, specialty: Specialty) -> Self {
        self.from_specialty = Some(specialty);
        self
    }

    /// True when the message is addressed to everyone or to the given agent.
    pub fn is_for(&self, agent_id: &str) -> bool {
        self.to_agent.as_deref().is_none_or(|to| to == agent_id)
    }
}

/// A multi-agent conversation on a topic within a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationSession {
    pub id: Ulid,
    pub project_id: String,
    pub topic: String,
    pub participants: Vec<String>,
    pub messages: Vec<CollaborationMessage>,
    /// Accumulated structured data, keyed by contributing agent id.
    pub shared_context: Value,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollaborationSession {
    pub fn new(
        project_id: impl Into<String>,
        topic: impl Into<String>,
        participants: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Ulid::new(),
            project_id: project_id.into(),
            topic: topic.into(),
            participants,
            messages: Vec::new(),
            shared_context: Value::Object(Map::new()),
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message. Only active sessions accept messages. A non-empty
    /// data payload is also recorded in the shared context under the sender.
    pub fn append(&mut self, message: CollaborationMessage) -> Result<(), SessionError> {
        self.require(SessionStatus::Active, "append messages")?;

        let has_data = match &message.data {
            Value::Object(map) => !map.is_empty(),
            Value::Null => false,
            _ => true,
        };
        if has_data {
            if !self.shared_context.is_object() {
                self.shared_context = Value::Object(Map::new());
            }
            if let Value::Object(shared) = &mut self.shared_context {
                shared.insert(message.from_agent.clone(), message.data.clone());
            }
        }

        self.messages.push(message);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.require(SessionStatus::Active, "pause")?;
        self.set_status(SessionStatus::Paused);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.require(SessionStatus::Paused, "resume")?;
        self.set_status(SessionStatus::Active);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), SessionError> {
        if self.status == SessionStatus::Completed {
            return Err(self.invalid("complete"));
        }
        self.set_status(SessionStatus::Completed);
        Ok(())
    }

    fn require(&self, expected: SessionStatus, action: &'static str) -> Result<(), SessionError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            id: self.id,
            status: self.status,
            action,
        }
    }

    fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> CollaborationSession {
        CollaborationSession::new(
            "novel-1",
            "the antagonist's motive",
            vec!["character-agent".to_string(), "plot-agent".to_string()],
        )
    }

    #[test]
    fn new_session_is_active_and_empty() {
        let s = session();
        assert_eq!(s.status, SessionStatus::Active);
        assert!(s.messages.is_empty());
        assert_eq!(s.participants.len(), 2);
        assert_eq!(s.created_at, s.updated_at);
    }

    #[test]
    fn append_records_data_in_shared_context() {
        let mut s = session();
        s.append(
            CollaborationMessage::new("character-agent", "Revenge for the flood")
                .with_data(json!({"motive": "revenge"})),
        )
        .unwrap();
        s.append(CollaborationMessage::new("plot-agent", "Fits act two")).unwrap();

        assert_eq!(s.messages.len(), 2);
        assert_eq!(s.shared_context["character-agent"]["motive"], "revenge");
        assert!(s.shared_context.get("plot-agent").is_none());
    }

    #[test]
    fn paused_session_rejects_messages_until_resumed() {
        let mut s = session();
        s.pause().unwrap();
        let err = s.append(CollaborationMessage::new("plot-agent", "hello")).unwrap_err();
        assert!(err.to_string().contains("paused"));

        s.resume().unwrap();
        s.append(CollaborationMessage::new("plot-agent", "hello")).unwrap();
        assert_eq!(s.messages.len(), 1);
    }

    #[test]
    fn completed_is_terminal() {
        let mut s = session();
        s.complete().unwrap();
        assert!(s.complete().is_err());
        assert!(s.resume().is_err());
        assert!(s.pause().is_err());
        assert!(s.append(CollaborationMessage::new("a", "b")).is_err());
    }

    #[test]
    fn addressing() {
        let broadcast = CollaborationMessage::new("a", "to all");
        let direct = CollaborationMessage::new("a", "to b").to("b");
        assert!(broadcast.is_for("anyone"));
        assert!(direct.is_for("b"));
        assert!(!direct.is_for("c"));
    }
}
