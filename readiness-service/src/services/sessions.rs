//! Session lifecycle: creation, validation, recovery and status transitions.

use crate::models::{Session, SessionStatus};
use crate::services::metrics::record_session_created;
use crate::services::store::SessionStore;
use crate::utils::{issue_recovery_token, verify_recovery_token, RecoveryToken};
use chrono::{Duration, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Compare-and-set retries before a status write gives up.
const STATUS_WRITE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Create a session and hand back the only copy of its recovery token.
    #[instrument(skip(self, email))]
    pub async fn create_session(&self, email: &str) -> Result<(Session, RecoveryToken), AppError> {
        let (token, token_hash) = issue_recovery_token();
        let session = Session::new(email.trim().to_string(), token_hash.into_string(), self.ttl);

        if let Err(e) = self.store.insert_session(&session).await {
            record_session_created("error");
            return Err(e);
        }

        record_session_created("ok");
        info!(session_id = %session.id, expires_at = %session.expires_at, "Session created");

        Ok((session, token))
    }

    /// The gate every session-scoped operation passes first.
    ///
    /// Missing sessions are `NotFound`, expired ones `Gone`. Never writes.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn get_valid_session(&self, id: Uuid) -> Result<Session, AppError> {
        let session = self
            .store
            .find_session(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Session not found")))?;

        if session.is_expired_at(Utc::now()) {
            info!(expires_at = %session.expires_at, "Rejected expired session");
            return Err(AppError::Gone(anyhow::anyhow!("Session has expired")));
        }

        Ok(session)
    }

    /// Exchange a recovery token for its session.
    #[instrument(skip(self, token), fields(session_id = %id))]
    pub async fn recover_session(&self, id: Uuid, token: &str) -> Result<Session, AppError> {
        let session = self.get_valid_session(id).await?;

        if !verify_recovery_token(token, &session.recovery_token_hash) {
            warn!("Recovery token mismatch");
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Invalid recovery token"
            )));
        }

        info!("Session recovered");
        Ok(session)
    }

    /// Move a session forward. Self-transitions succeed without a write.
    #[instrument(skip(self), fields(session_id = %id, to = %new_status))]
    pub async fn update_session_status(
        &self,
        id: Uuid,
        new_status: SessionStatus,
    ) -> Result<Session, AppError> {
        for attempt in 1..=STATUS_WRITE_ATTEMPTS {
            let session = self
                .store
                .find_session(id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Session not found")))?;

            let next = session.status.transition(new_status)?;
            if next == session.status {
                return Ok(session);
            }

            if self
                .store
                .update_session_status(id, session.status, next)
                .await?
            {
                info!(from = %session.status, "Session status updated");
                return Ok(Session {
                    status: next,
                    ..session
                });
            }

            warn!(attempt, "Session status changed concurrently, re-reading");
        }

        Err(AppError::Conflict(anyhow::anyhow!(
            "Session status changed concurrently"
        )))
    }
}
