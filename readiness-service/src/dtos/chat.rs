use super::not_blank;
use crate::models::{Domain, Message};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InitChatRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitChatResponse {
    pub initialized: bool,
    pub messages: Vec<Message>,
    pub is_existing: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub session_id: String,

    #[validate(
        length(
            min = 1,
            max = 10000,
            message = "Message must be between 1 and 10000 characters"
        ),
        custom(function = "not_blank")
    )]
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub messages: Vec<Message>,
    pub current_domain: Domain,
}
