//! In-memory session store for tests and local runs without PostgreSQL.

use crate::models::{
    Domain, Message, MessageRole, Session, SessionStatus, Snapshot, SnapshotReport, WELCOME_SEQ,
};
use crate::services::store::{SessionStore, WelcomeInsert};
use async_trait::async_trait;
use chrono::Utc;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    sessions: HashMap<Uuid, Session>,
    messages: HashMap<Uuid, Vec<Message>>,
    snapshots: HashMap<Uuid, Vec<Snapshot>>,
}

/// Same contract as the PostgreSQL store. One mutex makes every call atomic.
#[derive(Default)]
pub struct InMemorySessionStore {
    tables: Mutex<Tables>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store calls that only read.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Store calls that changed something.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("Session store lock poisoned")))
    }

    fn read(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.lock()
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn missing_session(id: Uuid) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("Session {} does not exist", id))
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.lock().map(|_| ())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        if tables.sessions.contains_key(&session.id) {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "Session {} already exists",
                session.id
            )));
        }
        tables.sessions.insert(session.id, session.clone());
        self.wrote();
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        Ok(self.read()?.sessions.get(&id).cloned())
    }

    async fn update_session_status(
        &self,
        id: Uuid,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<bool, AppError> {
        let mut tables = self.lock()?;
        match tables.sessions.get_mut(&id) {
            Some(session) if session.status == from => {
                session.status = to;
                self.wrote();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_current_domain(&self, id: Uuid, domain: Domain) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        if let Some(session) = tables.sessions.get_mut(&id) {
            session.current_domain = domain;
            self.wrote();
        }
        Ok(())
    }

    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>, AppError> {
        Ok(self
            .read()?
            .messages
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_welcome_message(
        &self,
        session_id: Uuid,
        content: &str,
    ) -> Result<WelcomeInsert, AppError> {
        let mut tables = self.lock()?;
        if !tables.sessions.contains_key(&session_id) {
            return Err(missing_session(session_id));
        }

        let messages = tables.messages.entry(session_id).or_default();
        if messages.iter().any(|m| m.seq == WELCOME_SEQ) {
            return Ok(WelcomeInsert::AlreadyPresent);
        }

        let message = Message {
            id: Uuid::new_v4(),
            session_id,
            seq: WELCOME_SEQ,
            role: MessageRole::Assistant,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        messages.insert(0, message.clone());
        self.wrote();
        Ok(WelcomeInsert::Inserted(message))
    }

    async fn append_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, AppError> {
        let mut tables = self.lock()?;
        if !tables.sessions.contains_key(&session_id) {
            return Err(missing_session(session_id));
        }

        let messages = tables.messages.entry(session_id).or_default();
        let seq = messages.last().map(|m| m.seq + 1).unwrap_or(WELCOME_SEQ);
        let message = Message {
            id: Uuid::new_v4(),
            session_id,
            seq,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        messages.push(message.clone());
        self.wrote();
        Ok(message)
    }

    async fn latest_snapshot(&self, session_id: Uuid) -> Result<Option<Snapshot>, AppError> {
        let tables = self.read()?;
        // max_by_key keeps the last of equal timestamps, i.e. the latest insert.
        Ok(tables
            .snapshots
            .get(&session_id)
            .and_then(|snapshots| snapshots.iter().max_by_key(|s| s.created_at))
            .cloned())
    }

    async fn insert_snapshot(
        &self,
        session_id: Uuid,
        report: &SnapshotReport,
    ) -> Result<Snapshot, AppError> {
        let mut tables = self.lock()?;
        if !tables.sessions.contains_key(&session_id) {
            return Err(missing_session(session_id));
        }

        let snapshot = Snapshot {
            id: Uuid::new_v4(),
            session_id,
            report: report.clone(),
            created_at: Utc::now(),
        };
        tables
            .snapshots
            .entry(session_id)
            .or_default()
            .push(snapshot.clone());
        self.wrote();
        Ok(snapshot)
    }
}
