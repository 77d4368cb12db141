//! PostgreSQL session store.

use crate::models::{
    Domain, Message, MessageRole, MessageRow, Session, SessionRow, SessionStatus, Snapshot,
    SnapshotReport, SnapshotRow, WELCOME_SEQ,
};
use crate::services::metrics::start_db_timer;
use crate::services::store::{SessionStore, WelcomeInsert};
use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Attempts for appends that lose the `(session_id, seq)` race.
const APPEND_ATTEMPTS: usize = 3;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "readiness-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn try_append(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<MessageRow, sqlx::Error> {
        // The aggregate yields one row even when the session has no messages.
        sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, session_id, seq, role, content)
            SELECT $1, $2, COALESCE(MAX(seq) + 1, 0), $3, $4
            FROM messages
            WHERE session_id = $2
            RETURNING id, session_id, seq, role, content, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(role.as_str())
        .bind(content)
        .fetch_one(&self.pool)
        .await
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    /// Check database health.
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self, session), fields(session_id = %session.id))]
    async fn insert_session(&self, session: &Session) -> Result<(), AppError> {
        let _timer = start_db_timer("insert_session");

        sqlx::query(
            r#"
            INSERT INTO sessions (id, email, recovery_token_hash, status, current_domain, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(session.id)
        .bind(&session.email)
        .bind(&session.recovery_token_hash)
        .bind(session.status.as_str())
        .bind(session.current_domain.as_str())
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create session: {}", e)))?;

        Ok(())
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn find_session(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        let _timer = start_db_timer("find_session");

        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, email, recovery_token_hash, status, current_domain, created_at, expires_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get session: {}", e)))?;

        row.map(Session::try_from).transpose()
    }

    #[instrument(skip(self), fields(session_id = %id, from = %from, to = %to))]
    async fn update_session_status(
        &self,
        id: Uuid,
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<bool, AppError> {
        let _timer = start_db_timer("update_session_status");

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = $3
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update session status: {}", e))
        })?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(session_id = %id, domain = %domain))]
    async fn update_current_domain(&self, id: Uuid, domain: Domain) -> Result<(), AppError> {
        let _timer = start_db_timer("update_current_domain");

        sqlx::query("UPDATE sessions SET current_domain = $2 WHERE id = $1")
            .bind(id)
            .bind(domain.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update domain: {}", e))
            })?;

        Ok(())
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<Message>, AppError> {
        let _timer = start_db_timer("list_messages");

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, session_id, seq, role, content, created_at
            FROM messages
            WHERE session_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list messages: {}", e)))?;

        rows.into_iter().map(Message::try_from).collect()
    }

    #[instrument(skip(self, content), fields(session_id = %session_id))]
    async fn insert_welcome_message(
        &self,
        session_id: Uuid,
        content: &str,
    ) -> Result<WelcomeInsert, AppError> {
        let _timer = start_db_timer("insert_welcome_message");

        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, session_id, seq, role, content)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (session_id, seq) DO NOTHING
            RETURNING id, session_id, seq, role, content, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(WELCOME_SEQ)
        .bind(MessageRole::Assistant.as_str())
        .bind(content)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to insert welcome message: {}", e))
        })?;

        match row {
            Some(row) => Ok(WelcomeInsert::Inserted(Message::try_from(row)?)),
            None => Ok(WelcomeInsert::AlreadyPresent),
        }
    }

    #[instrument(skip(self, content), fields(session_id = %session_id, role = %role))]
    async fn append_message(
        &self,
        session_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, AppError> {
        let _timer = start_db_timer("append_message");

        let mut attempt = 1;
        loop {
            match self.try_append(session_id, role, content).await {
                Ok(row) => return Message::try_from(row),
                Err(sqlx::Error::Database(ref db_err))
                    if db_err.is_unique_violation() && attempt < APPEND_ATTEMPTS =>
                {
                    warn!(attempt, "Concurrent append on session, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    return Err(AppError::DatabaseError(anyhow::anyhow!(
                        "Failed to append message: {}",
                        e
                    )))
                }
            }
        }
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn latest_snapshot(&self, session_id: Uuid) -> Result<Option<Snapshot>, AppError> {
        let _timer = start_db_timer("latest_snapshot");

        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, session_id, report, created_at
            FROM snapshots
            WHERE session_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get snapshot: {}", e)))?;

        Ok(row.map(Snapshot::from))
    }

    #[instrument(skip(self, report), fields(session_id = %session_id))]
    async fn insert_snapshot(
        &self,
        session_id: Uuid,
        report: &SnapshotReport,
    ) -> Result<Snapshot, AppError> {
        let _timer = start_db_timer("insert_snapshot");

        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            INSERT INTO snapshots (id, session_id, report)
            VALUES ($1, $2, $3)
            RETURNING id, session_id, report, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(Json(report))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to save snapshot: {}", e)))?;

        info!(snapshot_id = %row.id, "Snapshot saved");

        Ok(Snapshot::from(row))
    }
}
