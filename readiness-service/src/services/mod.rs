//! Services for readiness-service.

pub mod agent;
pub mod chat;
pub mod database;
pub mod email;
pub mod memory;
pub mod metrics;
pub mod sessions;
pub mod snapshots;
pub mod store;

pub use agent::{
    build_agent, AgentError, AgentReply, AnthropicAgent, ConversationAgent, ScriptedAgent,
};
pub use chat::{ChatInit, ChatService, ChatTurn};
pub use database::PgSessionStore;
pub use email::{EmailMessage, EmailProvider, MockEmailProvider, SmtpEmailProvider};
pub use memory::InMemorySessionStore;
pub use metrics::{get_metrics, init_metrics};
pub use sessions::SessionService;
pub use snapshots::SnapshotService;
pub use store::{SessionStore, WelcomeInsert};
