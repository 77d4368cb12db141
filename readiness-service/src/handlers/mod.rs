pub mod chat;
pub mod health;
pub mod metrics;
pub mod session;
pub mod snapshot;
