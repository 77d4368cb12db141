use crate::models::Snapshot;
use serde::Serialize;

/// `snapshot` serializes as `null` when none has been generated.
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub snapshot: Option<Snapshot>,
}

#[derive(Debug, Serialize)]
pub struct EmailSnapshotResponse {
    pub sent: bool,
}
