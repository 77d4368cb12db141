//! Domain models for readiness-service.

pub mod message;
pub mod session;
pub mod snapshot;

pub use message::{Message, MessageRole, MessageRow, WELCOME_SEQ};
pub use session::{Domain, Session, SessionRow, SessionStatus, TransitionError};
pub use snapshot::{
    Confidence, KeyFinding, NextStep, Risk, Snapshot, SnapshotReport, SnapshotRow, Strength,
    ValidationItem,
};
