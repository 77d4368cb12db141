use crate::dtos::{EmailSnapshotResponse, SnapshotResponse};
use crate::AppState;
use service_core::axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use service_core::utils::parse_uuid;

/// Latest snapshot, or `{"snapshot": null}`.
pub async fn get_snapshot(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SnapshotResponse>, AppError> {
    let session_id = parse_uuid(&session_id, "sessionId")?;
    let snapshot = state.snapshots.latest_snapshot(session_id).await?;

    Ok(Json(SnapshotResponse { snapshot }))
}

pub async fn generate_snapshot(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = parse_uuid(&session_id, "sessionId")?;
    let snapshot = state.snapshots.generate_snapshot(session_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(SnapshotResponse {
            snapshot: Some(snapshot),
        }),
    ))
}

pub async fn email_snapshot(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<EmailSnapshotResponse>, AppError> {
    let session_id = parse_uuid(&session_id, "sessionId")?;
    state.snapshots.email_snapshot(session_id).await?;

    Ok(Json(EmailSnapshotResponse { sent: true }))
}
