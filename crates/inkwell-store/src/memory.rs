// ABOUTME: In-memory CollaborationStore used by tests and by callers that need no persistence.
// ABOUTME: Guards its maps with a single mutex; records keep append order.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use inkwell_core::{CollaborationSession, ConversationRecord, Specialty};
use serde_json::Value;
use ulid::Ulid;

use crate::store::{CollaborationStore, StoreError};

#[derive(Default)]
struct Inner {
    records: Vec<ConversationRecord>,
    shared: HashMap<String, BTreeMap<Specialty, Value>>,
    sessions: Vec<CollaborationSession>,
}

/// A CollaborationStore that lives only as long as the process.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Total records across all projects.
    pub fn record_count(&self) -> usize {
        self.lock().map(|inner| inner.records.len()).unwrap_or(0)
    }
}

impl CollaborationStore for MemoryStore {
    fn append_record(&self, record: &ConversationRecord) -> Result<(), StoreError> {
        self.lock()?.records.push(record.clone());
        Ok(())
    }

    fn recent_records(
        &self,
        project_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, StoreError> {
        let inner = self.lock()?;
        let mut matching: Vec<ConversationRecord> = inner
            .records
            .iter()
            .rev()
            .filter(|r| r.project_id == project_id && r.agent_id == agent_id)
            .take(limit)
            .cloned()
            .collect();
        matching.reverse();
        Ok(matching)
    }

    fn project_records(&self, project_id: &str) -> Result<Vec<ConversationRecord>, StoreError> {
        Ok(self
            .lock()?
            .records
            .iter()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect())
    }

    fn put_shared_data(
        &self,
        project_id: &str,
        specialty: Specialty,
        _source_agent: &str,
        data: &Value,
    ) -> Result<(), StoreError> {
        self.lock()?
            .shared
            .entry(project_id.to_string())
            .or_default()
            .insert(specialty, data.clone());
        Ok(())
    }

    fn shared_data(&self, project_id: &str) -> Result<BTreeMap<Specialty, Value>, StoreError> {
        Ok(self
            .lock()?
            .shared
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    fn save_session(&self, session: &CollaborationSession) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        match inner.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => inner.sessions.push(session.clone()),
        }
        Ok(())
    }

    fn load_session(&self, session_id: &Ulid) -> Result<Option<CollaborationSession>, StoreError> {
        Ok(self
            .lock()?
            .sessions
            .iter()
            .find(|s| &s.id == session_id)
            .cloned())
    }

    fn list_sessions(&self, project_id: &str) -> Result<Vec<CollaborationSession>, StoreError> {
        Ok(self
            .lock()?
            .sessions
            .iter()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect())
    }
}
