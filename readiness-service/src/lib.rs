pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use service_core::axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    cors::{cors_middleware, CorsPolicy},
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use service_core::observability::REQUEST_ID_HEADER;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ReadinessConfig;
use crate::services::{
    ChatService, ConversationAgent, EmailProvider, SessionService, SessionStore, SnapshotService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ReadinessConfig>,
    pub store: Arc<dyn SessionStore>,
    pub sessions: SessionService,
    pub chat: ChatService,
    pub snapshots: SnapshotService,
    pub session_rate_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(
        config: ReadinessConfig,
        store: Arc<dyn SessionStore>,
        agent: Arc<dyn ConversationAgent>,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        let sessions = SessionService::new(store.clone(), config.session_ttl());
        let chat = ChatService::new(sessions.clone(), agent.clone());
        let snapshots = SnapshotService::new(sessions.clone(), agent, email);
        let session_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.session_attempts,
            config.rate_limit.session_window_seconds,
        );

        Self {
            config: Arc::new(config),
            store,
            sessions,
            chat,
            snapshots,
            session_rate_limiter,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors_policy = Arc::new(
        CorsPolicy::new(state.config.cors.allowed_origins.clone())
            .with_strict_origins(state.config.cors.strict_origins),
    );

    // Session creation and recovery are rate limited per client IP
    let session_routes = Router::new()
        .route("/api/session", post(handlers::session::create_session))
        .route(
            "/api/session/recover",
            post(handlers::session::recover_session),
        )
        .layer(from_fn_with_state(
            state.session_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .merge(session_routes)
        .route("/api/chat/init", post(handlers::chat::init_chat))
        .route("/api/chat/message", post(handlers::chat::send_message))
        .route(
            "/api/snapshot/:session_id",
            get(handlers::snapshot::get_snapshot).post(handlers::snapshot::generate_snapshot),
        )
        .route(
            "/api/snapshot/:session_id/email",
            post(handlers::snapshot::email_snapshot),
        )
        .with_state(state)
        // Add metrics middleware
        .layer(from_fn(metrics_middleware))
        // Add tracing layer
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        // Add security headers middleware
        .layer(from_fn(security_headers_middleware))
        // CORS gateway answers preflights before anything else runs
        .layer(from_fn_with_state(cors_policy, cors_middleware))
}
