// ABOUTME: SQLite-backed CollaborationStore for durable conversation logs, shared data, and sessions.
// ABOUTME: Records are append-only rows; shared data and sessions are upserted by key.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use inkwell_core::specialty::UnknownSpecialty;
use inkwell_core::{CollaborationSession, ConversationRecord, Specialty};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use ulid::Ulid;

use crate::store::{CollaborationStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS conversation_records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    agent_id TEXT NOT NULL,
    specialty TEXT NOT NULL,
    user_input TEXT NOT NULL,
    output_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_project_agent
    ON conversation_records (project_id, agent_id, seq);

CREATE TABLE IF NOT EXISTS shared_data (
    project_id TEXT NOT NULL,
    specialty TEXT NOT NULL,
    source_agent TEXT NOT NULL,
    data_json TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (project_id, specialty)
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    status TEXT NOT NULL,
    session_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// A CollaborationStore persisted in a single SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn query_records(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<ConversationRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(RecordRow {
                record_id: row.get(0)?,
                project_id: row.get(1)?,
                agent_id: row.get(2)?,
                specialty: row.get(3)?,
                user_input: row.get(4)?,
                output_json: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn query_sessions(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<CollaborationSession>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(serde_json::from_str(&row?)?);
        }
        Ok(sessions)
    }
}

const RECORD_COLUMNS: &str =
    "record_id, project_id, agent_id, specialty, user_input, output_json, created_at";

struct RecordRow {
    record_id: String,
    project_id: String,
    agent_id: String,
    specialty: String,
    user_input: String,
    output_json: String,
    created_at: String,
}

impl RecordRow {
    fn into_record(self) -> Result<ConversationRecord, StoreError> {
        let record_id = Ulid::from_string(&self.record_id)
            .map_err(|e| StoreError::Corrupt(format!("record id {}: {}", self.record_id, e)))?;
        let specialty: Specialty = self
            .specialty
            .parse()
            .map_err(|e: UnknownSpecialty| StoreError::Corrupt(e.to_string()))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| StoreError::Corrupt(format!("created_at {}: {}", self.created_at, e)))?
            .with_timezone(&Utc);
        Ok(ConversationRecord {
            record_id,
            project_id: self.project_id,
            agent_id: self.agent_id,
            specialty,
            user_input: self.user_input,
            output: serde_json::from_str(&self.output_json)?,
            created_at,
        })
    }
}

impl CollaborationStore for SqliteStore {
    fn append_record(&self, record: &ConversationRecord) -> Result<(), StoreError> {
        let output_json = serde_json::to_string(&record.output)?;
        self.conn()?.execute(
            "INSERT INTO conversation_records
                (record_id, project_id, agent_id, specialty, user_input, output_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.record_id.to_string(),
                record.project_id,
                record.agent_id,
                record.specialty.label(),
                record.user_input,
                output_json,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn recent_records(
        &self,
        project_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM (
                SELECT seq, {RECORD_COLUMNS} FROM conversation_records
                WHERE project_id = ?1 AND agent_id = ?2
                ORDER BY seq DESC LIMIT ?3
             ) ORDER BY seq ASC"
        );
        self.query_records(&sql, &[&project_id, &agent_id, &limit])
    }

    fn project_records(&self, project_id: &str) -> Result<Vec<ConversationRecord>, StoreError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM conversation_records WHERE project_id = ?1 ORDER BY seq ASC"
        );
        self.query_records(&sql, &[&project_id])
    }

    fn put_shared_data(
        &self,
        project_id: &str,
        specialty: Specialty,
        source_agent: &str,
        data: &Value,
    ) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO shared_data (project_id, specialty, source_agent, data_json, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(project_id, specialty) DO UPDATE SET
                source_agent = excluded.source_agent,
                data_json = excluded.data_json,
                updated_at = excluded.updated_at",
            params![
                project_id,
                specialty.label(),
                source_agent,
                serde_json::to_string(data)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn shared_data(&self, project_id: &str) -> Result<BTreeMap<Specialty, Value>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT specialty, data_json FROM shared_data WHERE project_id = ?1")?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut shared = BTreeMap::new();
        for row in rows {
            let (label, json) = row?;
            let specialty: Specialty = label
                .parse()
                .map_err(|e: UnknownSpecialty| StoreError::Corrupt(e.to_string()))?;
            shared.insert(specialty, serde_json::from_str(&json)?);
        }
        Ok(shared)
    }

    fn save_session(&self, session: &CollaborationSession) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO sessions (session_id, project_id, status, session_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(session_id) DO UPDATE SET
                status = excluded.status,
                session_json = excluded.session_json,
                updated_at = excluded.updated_at",
            params![
                session.id.to_string(),
                session.project_id,
                session.status.label(),
                serde_json::to_string(session)?,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load_session(&self, session_id: &Ulid) -> Result<Option<CollaborationSession>, StoreError> {
        let json: Option<String> = self
            .conn()?
            .query_row(
                "SELECT session_json FROM sessions WHERE session_id = ?1",
                params![session_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
            .transpose()
    }

    fn list_sessions(&self, project_id: &str) -> Result<Vec<CollaborationSession>, StoreError> {
        self.query_sessions(
            "SELECT session_json FROM sessions WHERE project_id = ?1 ORDER BY created_at ASC, session_id ASC",
            &[&project_id],
        )
    }
}
