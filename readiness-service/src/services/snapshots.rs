//! Snapshot retrieval, generation and email delivery.

use crate::models::{SessionStatus, Snapshot};
use crate::services::agent::{observe_call, ConversationAgent};
use crate::services::email::{render_snapshot_email, EmailProvider};
use crate::services::metrics::{record_email_sent, record_snapshot_generated};
use crate::services::sessions::SessionService;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct SnapshotService {
    sessions: SessionService,
    agent: Arc<dyn ConversationAgent>,
    email: Arc<dyn EmailProvider>,
}

impl SnapshotService {
    pub fn new(
        sessions: SessionService,
        agent: Arc<dyn ConversationAgent>,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        Self {
            sessions,
            agent,
            email,
        }
    }

    /// Most recent snapshot. `None` is a normal outcome, not an error.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn latest_snapshot(&self, session_id: Uuid) -> Result<Option<Snapshot>, AppError> {
        self.sessions.get_valid_session(session_id).await?;
        self.sessions.store().latest_snapshot(session_id).await
    }

    /// Draft a new report from the conversation and complete the session.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn generate_snapshot(&self, session_id: Uuid) -> Result<Snapshot, AppError> {
        let session = self.sessions.get_valid_session(session_id).await?;
        session.status.transition(SessionStatus::Completed)?;

        let store = self.sessions.store();
        let history = store.list_messages(session_id).await?;

        let report = match observe_call(
            self.agent.as_ref(),
            "snapshot",
            self.agent.draft_snapshot(&session, &history).await,
        ) {
            Ok(report) => report,
            Err(e) => {
                record_snapshot_generated("error");
                return Err(e);
            }
        };

        let snapshot = store.insert_snapshot(session_id, &report).await?;
        self.sessions
            .update_session_status(session_id, SessionStatus::Completed)
            .await?;

        record_snapshot_generated("ok");
        info!(snapshot_id = %snapshot.id, "Snapshot generated");

        Ok(snapshot)
    }

    /// Send the latest snapshot to the session's email address.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn email_snapshot(&self, session_id: Uuid) -> Result<(), AppError> {
        let session = self.sessions.get_valid_session(session_id).await?;
        let snapshot = self
            .sessions
            .store()
            .latest_snapshot(session_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!(
                    "No snapshot has been generated for this session"
                ))
            })?;

        let message = render_snapshot_email(&session.email, &snapshot)?;
        match self.email.send(&message).await {
            Ok(()) => {
                record_email_sent("ok");
                info!(snapshot_id = %snapshot.id, "Snapshot emailed");
                Ok(())
            }
            Err(e) => {
                record_email_sent("error");
                Err(e)
            }
        }
    }
}
