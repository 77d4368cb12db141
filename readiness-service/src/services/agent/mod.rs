//! Conversation agent seam.
//!
//! The agent writes the welcome message, replies to chat turns (and decides
//! which domain the conversation is in) and drafts snapshot reports. The
//! service only persists what the agent returns.

pub mod anthropic;
pub mod scripted;

pub use anthropic::AnthropicAgent;
pub use scripted::ScriptedAgent;

use crate::config::AgentConfig;
use crate::models::{Domain, Message, Session, SnapshotReport};
use crate::services::metrics::record_agent_call;
use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl AgentError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::NotConfigured(_) => "not_configured",
            AgentError::ApiError(_) => "api_error",
            AgentError::InvalidResponse(_) => "invalid_response",
            AgentError::RateLimited => "rate_limited",
            AgentError::NetworkError(_) => "network_error",
        }
    }
}

impl From<AgentError> for AppError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::NotConfigured(msg) => AppError::ConfigError(anyhow::anyhow!(msg)),
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

/// Agent answer to a user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub content: String,
    /// Domain the conversation is in after this reply.
    pub current_domain: Domain,
}

#[async_trait]
pub trait ConversationAgent: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn welcome_message(&self, session: &Session) -> Result<String, AgentError>;

    /// `history` ends with the user message being answered.
    async fn respond(&self, session: &Session, history: &[Message])
        -> Result<AgentReply, AgentError>;

    async fn draft_snapshot(
        &self,
        session: &Session,
        history: &[Message],
    ) -> Result<SnapshotReport, AgentError>;
}

/// Record the outcome of an agent call and convert its error.
pub fn observe_call<T>(
    agent: &dyn ConversationAgent,
    operation: &str,
    result: Result<T, AgentError>,
) -> Result<T, AppError> {
    match &result {
        Ok(_) => record_agent_call(agent.name(), operation, "ok"),
        Err(e) => {
            tracing::warn!(agent = agent.name(), operation, error = %e, "Agent call failed");
            record_agent_call(agent.name(), operation, e.kind());
        }
    }
    result.map_err(AppError::from)
}

/// Provider-backed agent when an API key is configured, scripted otherwise.
pub fn build_agent(config: &AgentConfig) -> Result<Arc<dyn ConversationAgent>, AgentError> {
    match config.api_key {
        Some(_) => {
            let agent = AnthropicAgent::new(config.clone())?;
            tracing::info!(model = %config.model, "Conversation agent initialized");
            Ok(Arc::new(agent))
        }
        None => {
            tracing::warn!("AGENT_API_KEY not set, using scripted conversation agent");
            Ok(Arc::new(ScriptedAgent::default()))
        }
    }
}
