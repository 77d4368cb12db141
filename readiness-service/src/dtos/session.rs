use crate::models::Session;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session: Session,
    /// Shown once; only its hash is stored.
    pub recovery_token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecoverSessionRequest {
    pub session_id: String,

    #[validate(length(min = 1, message = "Recovery token is required"))]
    pub recovery_token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: Session,
}
