//! CORS gateway behaviour on the assembled router.

mod common;

use common::{empty_request, get_request, json_request, test_config, TestApp, ALLOWED_ORIGIN};
use serde_json::json;
use service_core::axum::http::{header, Method, StatusCode};

#[tokio::test]
async fn preflight_is_answered_before_routing() {
    let app = TestApp::spawn();

    let mut request = empty_request(Method::OPTIONS, "/api/session");
    request
        .headers_mut()
        .insert(header::ORIGIN, "http://localhost:3000".parse().unwrap());
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, DELETE, OPTIONS"
    );
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    assert_eq!(app.store.write_count(), 0);
}

#[tokio::test]
async fn unknown_origin_gets_first_allowed_origin() {
    let app = TestApp::spawn();

    let mut request = json_request(
        Method::POST,
        "/api/session",
        &json!({ "email": "founder@atlas.example" }),
    );
    request
        .headers_mut()
        .insert(header::ORIGIN, "https://evil.example".parse().unwrap());
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ALLOWED_ORIGIN
    );
}

#[tokio::test]
async fn strict_origins_omit_unknown_origin() {
    let mut config = test_config();
    config.cors.strict_origins = true;
    let app = TestApp::with_config(config);

    let mut request = get_request("/api/snapshot/not-a-uuid");
    request
        .headers_mut()
        .insert(header::ORIGIN, "https://evil.example".parse().unwrap());
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_METHODS)
        .is_some());
}

#[tokio::test]
async fn error_responses_carry_cors_headers() {
    let app = TestApp::spawn();

    let mut request = get_request("/api/snapshot/not-a-uuid");
    request
        .headers_mut()
        .insert(header::ORIGIN, ALLOWED_ORIGIN.parse().unwrap());
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ALLOWED_ORIGIN
    );
}

#[tokio::test]
async fn non_api_paths_have_no_cors_headers() {
    let app = TestApp::spawn();

    let mut request = get_request("/health");
    request
        .headers_mut()
        .insert(header::ORIGIN, ALLOWED_ORIGIN.parse().unwrap());
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
