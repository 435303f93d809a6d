// ABOUTME: Provides AgentContext, the per-call input handed to an agent.
// ABOUTME: Holds the user input, a bounded conversation window, and collaboration data from peer agents.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::specialty::Specialty;

/// The maximum number of prior conversation turns carried in a context.
pub const HISTORY_WINDOW: usize = 10;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Agent,
}

/// One prior exchange in the conversation with an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Agent,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Everything an agent needs for one dispatch. Constructed per call and never
/// persisted directly; its derivative AgentOutput is what gets stored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentContext {
    pub project_id: String,
    pub user_input: String,
    #[serde(default, deserialize_with = "bounded_history")]
    history: Vec<ConversationTurn>,
    /// Structured output contributed by other agents, keyed by their specialty.
    #[serde(default)]
    pub collaboration_data: BTreeMap<Specialty, Value>,
}

fn bounded_history<'de, D>(deserializer: D) -> Result<Vec<ConversationTurn>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let mut turns = Vec::<ConversationTurn>::deserialize(deserializer)?;
    if turns.len() > HISTORY_WINDOW {
        turns.drain(0..turns.len() - HISTORY_WINDOW);
    }
    Ok(turns)
}

impl AgentContext {
    /// Create a context with no history and no collaboration data.
    pub fn new(project_id: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            user_input: user_input.into(),
            history: Vec::new(),
            collaboration_data: BTreeMap::new(),
        }
    }

    /// Attach prior turns, keeping only the most recent HISTORY_WINDOW of them.
    pub fn with_history(mut self, turns: Vec<ConversationTurn>) -> Self {
        self.set_history(turns);
        self
    }

    /// Add one specialty's structured output to the collaboration data.
    pub fn with_collaboration(mut self, specialty: Specialty, data: Value) -> Self {
        self.collaboration_data.insert(specialty, data);
        self
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Replace the history, dropping anything older than the window.
    pub fn set_history(&mut self, mut turns: Vec<ConversationTurn>) {
        if turns.len() > HISTORY_WINDOW {
            turns.drain(0..turns.len() - HISTORY_WINDOW);
        }
        self.history = turns;
    }

    /// Insert collaboration entries that the context does not already carry.
    /// Entries set explicitly by the caller always win.
    pub fn merge_collaboration<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (Specialty, Value)>,
    {
        for (specialty, data) in entries {
            self.collaboration_data.entry(specialty).or_insert(data);
        }
    }

    /// Render the history as `role: content` lines for prompt construction.
    pub fn history_transcript(&self) -> String {
        self.history
            .iter()
            .map(|turn| {
                let who = match turn.role {
                    TurnRole::User => "User",
                    TurnRole::Agent => "Assistant",
                };
                format!("{}: {}", who, turn.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn context_creation_is_empty() {
        let ctx = AgentContext::new("proj-1", "Write a storm scene");
        assert_eq!(ctx.project_id, "proj-1");
        assert_eq!(ctx.user_input, "Write a storm scene");
        assert!(ctx.history().is_empty());
        assert!(ctx.collaboration_data.is_empty());
    }

    #[test]
    fn history_is_bounded_to_most_recent_turns() {
        let turns: Vec<ConversationTurn> = (0..25)
            .map(|i| ConversationTurn::user(format!("turn {}", i)))
            .collect();
        let ctx = AgentContext::new("p", "x").with_history(turns);

        assert_eq!(ctx.history().len(), HISTORY_WINDOW);
        assert_eq!(ctx.history()[0].content, "turn 15");
        assert_eq!(ctx.history()[HISTORY_WINDOW - 1].content, "turn 24");
    }

    #[test]
    fn merge_keeps_explicit_entries() {
        let mut ctx = AgentContext::new("p", "x")
            .with_collaboration(Specialty::Theme, json!({"themes": ["loss"]}));
        ctx.merge_collaboration(vec![
            (Specialty::Theme, json!({"themes": ["stale"]})),
            (Specialty::World, json!({"setting": "harbor town"})),
        ]);

        assert_eq!(ctx.collaboration_data[&Specialty::Theme]["themes"][0], "loss");
        assert_eq!(ctx.collaboration_data[&Specialty::World]["setting"], "harbor town");
    }

    #[test]
    fn transcript_labels_roles() {
        let ctx = AgentContext::new("p", "x").with_history(vec![
            ConversationTurn::user("Who is the hero?"),
            ConversationTurn::agent("A lighthouse keeper."),
        ]);
        assert_eq!(
            ctx.history_transcript(),
            "User: Who is the hero?\nAssistant: A lighthouse keeper."
        );
    }
}
