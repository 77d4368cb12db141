//! Chat initialization and chat turns.

use crate::models::{Domain, Message, MessageRole, SessionStatus, WELCOME_SEQ};
use crate::services::agent::{observe_call, ConversationAgent};
use crate::services::metrics::{record_chat_initialization, record_chat_turn};
use crate::services::sessions::SessionService;
use crate::services::store::WelcomeInsert;
use service_core::error::AppError;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatInit {
    pub messages: Vec<Message>,
    pub is_existing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    /// The stored user message followed by the agent reply.
    pub messages: Vec<Message>,
    pub current_domain: Domain,
}

#[derive(Clone)]
pub struct ChatService {
    sessions: SessionService,
    agent: Arc<dyn ConversationAgent>,
}

impl ChatService {
    pub fn new(sessions: SessionService, agent: Arc<dyn ConversationAgent>) -> Self {
        Self { sessions, agent }
    }

    /// Produce the welcome message once, or replay the existing conversation.
    ///
    /// The store's insert-if-absent decides which concurrent caller creates
    /// the welcome message; the loser replays what the winner stored.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn init_chat(&self, session_id: Uuid) -> Result<ChatInit, AppError> {
        let session = self.sessions.get_valid_session(session_id).await?;
        let store = self.sessions.store();

        let existing = store.list_messages(session_id).await?;
        if !existing.is_empty() {
            if session.status == SessionStatus::Started {
                // An earlier init stored the welcome but never advanced the status.
                warn!("Session has messages but is still started, advancing");
                self.sessions
                    .update_session_status(session_id, SessionStatus::InProgress)
                    .await?;
            }
            record_chat_initialization("existing");
            return Ok(ChatInit {
                messages: existing,
                is_existing: true,
            });
        }

        let welcome = observe_call(
            self.agent.as_ref(),
            "welcome",
            self.agent.welcome_message(&session).await,
        )?;

        match store.insert_welcome_message(session_id, &welcome).await? {
            WelcomeInsert::Inserted(message) => {
                self.sessions
                    .update_session_status(session_id, SessionStatus::InProgress)
                    .await?;
                record_chat_initialization("created");
                info!("Chat initialized");
                Ok(ChatInit {
                    messages: vec![message],
                    is_existing: false,
                })
            }
            WelcomeInsert::AlreadyPresent => {
                info!("Concurrent chat initialization won the welcome insert");
                record_chat_initialization("existing");
                Ok(ChatInit {
                    messages: store.list_messages(session_id).await?,
                    is_existing: true,
                })
            }
        }
    }

    /// Get the agent reply to a user message, then store both and apply the domain.
    #[instrument(skip(self, content), fields(session_id = %session_id))]
    pub async fn send_message(&self, session_id: Uuid, content: &str) -> Result<ChatTurn, AppError> {
        let session = self.sessions.get_valid_session(session_id).await?;

        match session.status {
            SessionStatus::InProgress => {}
            SessionStatus::Started => {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Chat has not been initialized for this session"
                )))
            }
            SessionStatus::Completed => {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "This assessment is already completed"
                )))
            }
        }

        let store = self.sessions.store();
        let content = content.trim();

        // Nothing is stored until the agent has answered.
        let mut history = store.list_messages(session_id).await?;
        let pending_seq = history.last().map(|m| m.seq + 1).unwrap_or(WELCOME_SEQ);
        history.push(Message {
            id: Uuid::new_v4(),
            session_id,
            seq: pending_seq,
            role: MessageRole::User,
            content: content.to_string(),
            created_at: Utc::now(),
        });

        let reply = observe_call(
            self.agent.as_ref(),
            "respond",
            self.agent.respond(&session, &history).await,
        )?;

        let user_message = store
            .append_message(session_id, MessageRole::User, content)
            .await?;
        let assistant_message = store
            .append_message(session_id, MessageRole::Assistant, &reply.content)
            .await?;

        if reply.current_domain != session.current_domain {
            store
                .update_current_domain(session_id, reply.current_domain)
                .await?;
            info!(
                from = %session.current_domain,
                to = %reply.current_domain,
                "Conversation moved to a new domain"
            );
        }

        record_chat_turn(reply.current_domain.as_str());

        Ok(ChatTurn {
            messages: vec![user_message, assistant_message],
            current_domain: reply.current_domain,
        })
    }
}
