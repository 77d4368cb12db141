use crate::dtos::{InitChatRequest, InitChatResponse, SendMessageRequest, SendMessageResponse};
use crate::AppState;
use service_core::axum::{extract::State, Json};
use service_core::error::AppError;
use service_core::utils::{parse_uuid, ValidatedJson};

/// Idempotently start the conversation.
pub async fn init_chat(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<InitChatRequest>,
) -> Result<Json<InitChatResponse>, AppError> {
    let session_id = parse_uuid(&req.session_id, "sessionId")?;
    let init = state.chat.init_chat(session_id).await?;

    Ok(Json(InitChatResponse {
        initialized: true,
        messages: init.messages,
        is_existing: init.is_existing,
    }))
}

pub async fn send_message(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let session_id = parse_uuid(&req.session_id, "sessionId")?;
    let turn = state.chat.send_message(session_id, &req.content).await?;

    Ok(Json(SendMessageResponse {
        messages: turn.messages,
        current_domain: turn.current_domain,
    }))
}
