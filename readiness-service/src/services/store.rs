//! Storage seam for sessions, messages and snapshots.

use crate::models::{Domain, Message, MessageRole, Session, SessionStatus, Snapshot, SnapshotReport};
use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

/// Result of the atomic insert-if-absent for the welcome message.
#[derive(Debug, Clone, PartialEq)]
pub enum WelcomeInsert {
    /// This call created the welcome message.
    Inserted(Message),
    /// The session already had a message at the welcome position.
    AlreadyPresent,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    async fn insert_session(&self, session: &Session) -> Result<(), AppError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, AppError>;

    /// Compare-and-set on status. Returns `false` when the stored status was not `from`.
    async fn update_session_status(
        &self,
        id: Uuid,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<bool, AppError>;

    async fn update_current_domain(&self, id: Uuid, domain: Domain) -> Result<(), AppError>;

    /// Messages in `seq` order.
    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>, AppError>;

    /// Insert the assistant welcome message at the welcome position unless one exists.
    async fn insert_welcome_message(
        &self,
        session_id: Uuid,
        content: &str,
    ) -> Result<WelcomeInsert, AppError>;

    /// Append a message after the last one.
    async fn append_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, AppError>;

    /// Most recently created snapshot, if any.
    async fn latest_snapshot(&self, session_id: Uuid) -> Result<Option<Snapshot>, AppError>;

    async fn insert_snapshot(
        &self,
        session_id: Uuid,
        report: &SnapshotReport,
    ) -> Result<Snapshot, AppError>;
}
