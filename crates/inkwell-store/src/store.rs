// ABOUTME: Defines the CollaborationStore port: the durable log behind agent conversations.
// ABOUTME: Stores per-agent conversation records, per-project shared data, and collaboration sessions.

use std::collections::BTreeMap;

use inkwell_core::{CollaborationSession, ConversationRecord, Specialty};
use serde_json::Value;
use thiserror::Error;
use ulid::Ulid;

/// Errors that can occur while reading or writing the collaboration store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Durable storage for everything agents produce, keyed by project and agent.
///
/// Records are append-only: every call to `append_record` adds a new entry,
/// even when an identical record already exists.
pub trait CollaborationStore: Send + Sync {
    /// Append one dispatch to the conversation log.
    fn append_record(&self, record: &ConversationRecord) -> Result<(), StoreError>;

    /// The most recent `limit` records for one agent in one project, oldest first.
    fn recent_records(
        &self,
        project_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, StoreError>;

    /// Every record for a project, in append order.
    fn project_records(&self, project_id: &str) -> Result<Vec<ConversationRecord>, StoreError>;

    /// Publish a specialty's structured output for other agents in the project.
    /// Replaces any earlier payload from the same specialty.
    fn put_shared_data(
        &self,
        project_id: &str,
        specialty: Specialty,
        source_agent: &str,
        data: &Value,
    ) -> Result<(), StoreError>;

    /// All shared payloads for a project, keyed by contributing specialty.
    fn shared_data(&self, project_id: &str) -> Result<BTreeMap<Specialty, Value>, StoreError>;

    /// Insert or replace a session's full state.
    fn save_session(&self, session: &CollaborationSession) -> Result<(), StoreError>;

    fn load_session(&self, session_id: &Ulid) -> Result<Option<CollaborationSession>, StoreError>;

    /// Sessions for a project, oldest first.
    fn list_sessions(&self, project_id: &str) -> Result<Vec<CollaborationSession>, StoreError>;
}
