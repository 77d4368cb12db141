//! Application startup and lifecycle management.

use crate::config::ReadinessConfig;
use crate::services::{
    build_agent, EmailProvider, InMemorySessionStore, PgSessionStore, SessionStore,
    SmtpEmailProvider,
};
use crate::{build_router, AppState};
use service_core::axum::Router;
use service_core::error::AppError;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ReadinessConfig) -> Result<Self, AppError> {
        let store: Arc<dyn SessionStore> = match &config.database.url {
            Some(url) => {
                let db = PgSessionStore::new(
                    url,
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to PostgreSQL: {}", e);
                    e
                })?;

                db.run_migrations().await.map_err(|e| {
                    tracing::error!("Failed to run database migrations: {}", e);
                    e
                })?;

                Arc::new(db)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory session store");
                Arc::new(InMemorySessionStore::new())
            }
        };

        let agent = build_agent(&config.agent)?;

        // The transport is built on first send; a missing key only fails that request
        if config.email.api_key.is_none() {
            tracing::warn!("EMAIL_API_KEY not set, snapshot emails will fail until configured");
        }
        let email: Arc<dyn EmailProvider> = Arc::new(SmtpEmailProvider::new(config.email.clone()));

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let state = AppState::new(config, store, agent, email);

        // Bind HTTP listener (port 0 = random port for testing)
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Readiness service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until the shutdown future resolves.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        service_core::axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    }
}
