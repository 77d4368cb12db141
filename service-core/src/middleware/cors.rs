//! Allow-list CORS gateway for the public API prefix.
//!
//! Every request under the prefix gets the same `Access-Control-*` headers.
//! Preflight `OPTIONS` requests are answered here and never reach a handler.
//!
//! When the request `Origin` is not on the allow-list the first configured
//! origin is echoed instead (browsers then reject the response). Setting
//! `strict_origins` omits the header for unknown origins.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

pub const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";
pub const PREFLIGHT_MAX_AGE_SECS: u32 = 86_400;
pub const API_PREFIX: &str = "/api";

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
    strict_origins: bool,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self {
            allowed_origins,
            strict_origins: false,
        }
    }

    pub fn with_strict_origins(mut self, strict: bool) -> Self {
        self.strict_origins = strict;
        self
    }

    /// Whether the gateway handles this path.
    pub fn applies_to(&self, path: &str) -> bool {
        match path.strip_prefix(API_PREFIX) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Origin to echo in `Access-Control-Allow-Origin`.
    pub fn resolve_origin<'a>(&'a self, request_origin: Option<&'a str>) -> Option<&'a str> {
        if let Some(origin) = request_origin
            && self.allowed_origins.iter().any(|o| o == origin)
        {
            return Some(origin);
        }

        if self.strict_origins {
            return None;
        }

        self.allowed_origins.first().map(String::as_str)
    }

    fn apply(&self, headers: &mut HeaderMap, request_origin: Option<&str>) {
        if let Some(origin) = self.resolve_origin(request_origin)
            && let Ok(value) = HeaderValue::from_str(origin)
        {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
    }
}

pub async fn cors_middleware(
    State(policy): State<Arc<CorsPolicy>>,
    req: Request,
    next: Next,
) -> Response {
    if !policy.applies_to(req.uri().path()) {
        return next.run(req).await;
    }

    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if origin.is_some() && policy.resolve_origin(origin.as_deref()) != origin.as_deref() {
        tracing::debug!(origin = ?origin, "Origin not on CORS allow-list");
    }

    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        policy.apply(headers, origin.as_deref());
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from(PREFLIGHT_MAX_AGE_SECS),
        );
        return response;
    }

    let mut response = next.run(req).await;
    policy.apply(response.headers_mut(), origin.as_deref());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, middleware::from_fn_with_state, routing::get};
    use tower::ServiceExt;

    fn policy() -> CorsPolicy {
        CorsPolicy::new(vec![
            "https://atlas.example".to_string(),
            "http://localhost:3000".to_string(),
        ])
    }

    fn app(policy: CorsPolicy) -> Router {
        Router::new()
            .route("/api/ping", get(|| async { "pong" }))
            .route("/health", get(|| async { "ok" }))
            .layer(from_fn_with_state(Arc::new(policy), cors_middleware))
    }

    #[test]
    fn prefix_matching() {
        let p = policy();
        assert!(p.applies_to("/api"));
        assert!(p.applies_to("/api/session"));
        assert!(!p.applies_to("/apiary"));
        assert!(!p.applies_to("/health"));
    }

    #[test]
    fn matching_origin_is_echoed() {
        let p = policy();
        assert_eq!(
            p.resolve_origin(Some("http://localhost:3000")),
            Some("http://localhost:3000")
        );
    }

    #[test]
    fn unknown_origin_falls_back_to_first_entry() {
        let p = policy();
        assert_eq!(
            p.resolve_origin(Some("https://evil.example")),
            Some("https://atlas.example")
        );
        assert_eq!(p.resolve_origin(None), Some("https://atlas.example"));
    }

    #[test]
    fn strict_mode_omits_unknown_origins() {
        let p = policy().with_strict_origins(true);
        assert_eq!(p.resolve_origin(Some("https://evil.example")), None);
        assert_eq!(
            p.resolve_origin(Some("https://atlas.example")),
            Some("https://atlas.example")
        );
    }

    #[tokio::test]
    async fn preflight_short_circuits() {
        let response = app(policy())
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/ping")
                    .header(header::ORIGIN, "https://atlas.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://atlas.example");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], ALLOWED_METHODS);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], ALLOWED_HEADERS);
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn forwarded_requests_carry_headers() {
        let response = app(policy())
            .oneshot(
                Request::builder()
                    .uri("/api/ping")
                    .header(header::ORIGIN, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://atlas.example"
        );
        assert!(response.headers().get(header::ACCESS_CONTROL_MAX_AGE).is_none());
    }

    #[tokio::test]
    async fn non_api_paths_are_untouched() {
        let response = app(policy())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://atlas.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }
}
