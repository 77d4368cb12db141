//! Shared setup for readiness-service integration tests.
//!
//! Routers run against the in-memory store, the scripted agent and a mock
//! mailbox, so no external services are needed.

#![allow(dead_code)]

use readiness_service::{
    build_router,
    config::{
        AgentConfig, CorsConfig, DatabaseConfig, EmailConfig, Environment, RateLimitConfig,
        ReadinessConfig, SessionConfig,
    },
    services::{
        EmailProvider, InMemorySessionStore, MockEmailProvider, ScriptedAgent, SessionStore,
        SmtpEmailProvider,
    },
    AppState,
};
use serde_json::Value;
use service_core::axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use std::sync::{Arc, Once};
use tower::ServiceExt;

pub const ALLOWED_ORIGIN: &str = "https://atlas.example";

static TRACING: Once = Once::new();

pub fn init_test_tracing() {
    TRACING.call_once(|| {
        service_core::observability::init_tracing("readiness-service-test", "error", None);
    });
}

pub fn test_config() -> ReadinessConfig {
    ReadinessConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "readiness-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: None,
            max_connections: 5,
            min_connections: 1,
        },
        session: SessionConfig { ttl_hours: 168 },
        cors: CorsConfig {
            allowed_origins: vec![
                ALLOWED_ORIGIN.to_string(),
                "http://localhost:3000".to_string(),
            ],
            strict_origins: false,
        },
        rate_limit: RateLimitConfig {
            session_attempts: 100,
            session_window_seconds: 60,
        },
        agent: AgentConfig {
            api_key: None,
            model: "scripted".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 1,
            max_tokens: 512,
        },
        email: EmailConfig {
            api_key: None,
            smtp_host: "127.0.0.1".to_string(),
            smtp_port: 2525,
            smtp_user: "test".to_string(),
            from_address: "snapshots@atlas.example".to_string(),
            from_name: "Atlas Readiness Guide".to_string(),
        },
    }
}

/// Router plus handles on the in-memory store and mailbox behind it.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemorySessionStore>,
    pub mailbox: Arc<MockEmailProvider>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ReadinessConfig) -> Self {
        init_test_tracing();

        let store = Arc::new(InMemorySessionStore::new());
        let mailbox = Arc::new(MockEmailProvider::new(true));
        let state = AppState::new(
            config,
            store.clone() as Arc<dyn SessionStore>,
            Arc::new(ScriptedAgent::default()),
            mailbox.clone() as Arc<dyn EmailProvider>,
        );

        Self {
            router: build_router(state),
            store,
            mailbox,
        }
    }

    /// App whose email provider is the real SMTP one with no API key.
    /// `mailbox` is not wired in and stays empty.
    pub fn with_unconfigured_smtp() -> Self {
        init_test_tracing();

        let config = test_config();
        let store = Arc::new(InMemorySessionStore::new());
        let email = Arc::new(SmtpEmailProvider::new(config.email.clone()));
        let state = AppState::new(
            config,
            store.clone() as Arc<dyn SessionStore>,
            Arc::new(ScriptedAgent::default()),
            email as Arc<dyn EmailProvider>,
        );

        Self {
            router: build_router(state),
            store,
            mailbox: Arc::new(MockEmailProvider::new(true)),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed to respond")
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let response = self.send(get_request(uri)).await;
        into_json(response).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = self.send(json_request(Method::POST, uri, &body)).await;
        into_json(response).await
    }

    pub async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        let response = self.send(empty_request(Method::POST, uri)).await;
        into_json(response).await
    }

    /// Create a session and return `(session_id, recovery_token)`.
    pub async fn create_session(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .post_json("/api/session", serde_json::json!({ "email": email }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create session failed: {}", body);

        (
            body["session"]["id"].as_str().unwrap().to_string(),
            body["recoveryToken"].as_str().unwrap().to_string(),
        )
    }

    /// Create a session and initialize its chat.
    pub async fn started_chat(&self) -> String {
        let (session_id, _) = self.create_session("founder@atlas.example").await;
        let (status, _) = self
            .post_json(
                "/api/chat/init",
                serde_json::json!({ "sessionId": session_id }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        session_id
    }
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn into_json(response: Response<Body>) -> (StatusCode, Value) {
    use http_body_util::BodyExt;

    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();

    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, body)
}
