//! Session model - one user's assessment run.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle status. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Started,
    InProgress,
    Completed,
}

impl SessionStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    fn rank(self) -> u8 {
        match self {
            Self::Started => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
        }
    }

    /// A status may stay where it is or advance exactly one step.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        next == self || next.rank() == self.rank() + 1
    }

    pub fn transition(self, next: SessionStatus) -> Result<SessionStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(Self::Started),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!("Unknown session status: {}", other)),
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot move session from {from} to {to}")]
pub struct TransitionError {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::Conflict(anyhow::Error::new(err))
    }
}

/// The five assessment topic areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Market,
    Product,
    Gtm,
    Operations,
    Financials,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Market,
        Domain::Product,
        Domain::Gtm,
        Domain::Operations,
        Domain::Financials,
    ];

    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Product => "product",
            Self::Gtm => "gtm",
            Self::Operations => "operations",
            Self::Financials => "financials",
        }
    }

    /// Human readable name used in prompts and emails.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Market => "Market",
            Self::Product => "Product",
            Self::Gtm => "Go-to-market",
            Self::Operations => "Operations",
            Self::Financials => "Financials",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "market" => Ok(Self::Market),
            "product" => Ok(Self::Product),
            "gtm" => Ok(Self::Gtm),
            "operations" => Ok(Self::Operations),
            "financials" => Ok(Self::Financials),
            other => Err(format!("Unknown domain: {}", other)),
        }
    }
}

/// Session entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub recovery_token_hash: String,
    pub status: SessionStatus,
    pub current_domain: Domain,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session at the start of the lifecycle.
    pub fn new(email: String, recovery_token_hash: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            recovery_token_hash,
            status: SessionStatus::Started,
            current_domain: Domain::Market,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Expired strictly after `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Database row for `sessions`.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub email: String,
    pub recovery_token_hash: String,
    pub status: String,
    pub current_domain: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<SessionStatus>()
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        let current_domain = row
            .current_domain
            .parse::<Domain>()
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(Self {
            id: row.id,
            email: row.email,
            recovery_token_hash: row.recovery_token_hash,
            status,
            current_domain,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_allowed() {
        assert_eq!(
            SessionStatus::Started.transition(SessionStatus::InProgress),
            Ok(SessionStatus::InProgress)
        );
        assert_eq!(
            SessionStatus::InProgress.transition(SessionStatus::Completed),
            Ok(SessionStatus::Completed)
        );
    }

    #[test]
    fn self_transitions_are_no_ops() {
        for status in [
            SessionStatus::Started,
            SessionStatus::InProgress,
            SessionStatus::Completed,
        ] {
            assert_eq!(status.transition(status), Ok(status));
        }
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let cases = [
            (SessionStatus::Completed, SessionStatus::Started),
            (SessionStatus::Completed, SessionStatus::InProgress),
            (SessionStatus::InProgress, SessionStatus::Started),
            (SessionStatus::Started, SessionStatus::Completed),
        ];

        for (from, to) in cases {
            let err = from.transition(to).unwrap_err();
            assert_eq!(err, TransitionError { from, to });
        }
    }

    #[test]
    fn transition_error_maps_to_conflict() {
        let err: AppError = SessionStatus::Completed
            .transition(SessionStatus::Started)
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(err.to_string().contains("completed to started"));
    }

    #[test]
    fn new_session_defaults() {
        let session = Session::new("a@b.co".into(), "hash".into(), Duration::hours(168));
        assert_eq!(session.status, SessionStatus::Started);
        assert_eq!(session.current_domain, Domain::Market);
        assert_eq!(session.expires_at - session.created_at, Duration::hours(168));
    }

    #[test]
    fn expiry_is_strictly_after_expires_at() {
        let session = Session::new("a@b.co".into(), "hash".into(), Duration::hours(1));
        assert!(!session.is_expired_at(session.expires_at - Duration::seconds(1)));
        assert!(!session.is_expired_at(session.expires_at));
        assert!(session.is_expired_at(session.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn serialization_hides_token_hash_and_uses_wire_names() {
        let mut session = Session::new("a@b.co".into(), "secret-hash".into(), Duration::hours(1));
        session.status = SessionStatus::InProgress;
        session.current_domain = Domain::Gtm;

        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("recoveryTokenHash").is_none());
        assert!(!json.to_string().contains("secret-hash"));
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["currentDomain"], "gtm");
        assert!(json.get("expiresAt").is_some());
    }

    #[test]
    fn row_with_unknown_status_is_rejected() {
        let row = SessionRow {
            id: Uuid::new_v4(),
            email: "a@b.co".into(),
            recovery_token_hash: "h".into(),
            status: "archived".into(),
            current_domain: "market".into(),
            created_at: Utc::now(),
            expires_at: Utc::now(),
        };
        assert!(matches!(
            Session::try_from(row),
            Err(AppError::DatabaseError(_))
        ));
    }
}
