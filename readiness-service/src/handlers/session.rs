use crate::dtos::{
    CreateSessionRequest, CreateSessionResponse, RecoverSessionRequest, SessionResponse,
};
use crate::AppState;
use service_core::axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;
use service_core::utils::{parse_uuid, ValidatedJson};

/// Start a new assessment session.
pub async fn create_session(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (session, token) = state.sessions.create_session(&req.email).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session,
            recovery_token: token.into_string(),
        }),
    ))
}

/// Resume a session with its recovery token.
pub async fn recover_session(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RecoverSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let session_id = parse_uuid(&req.session_id, "sessionId")?;
    let session = state
        .sessions
        .recover_session(session_id, &req.recovery_token)
        .await?;

    Ok(Json(SessionResponse { session }))
}
