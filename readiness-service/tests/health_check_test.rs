//! Health, readiness and metrics endpoints.

mod common;

use common::{get_request, TestApp};
use readiness_service::services::init_metrics;
use service_core::axum::http::{header, StatusCode};

#[tokio::test]
async fn health_check_reports_service() {
    let app = TestApp::spawn();

    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "readiness-service-test");
}

#[tokio::test]
async fn readiness_check_is_ok() {
    let app = TestApp::spawn();

    let response = app.send(get_request("/ready")).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestApp::spawn();

    let response = app.send(get_request("/health")).await;

    let headers = response.headers();
    assert!(headers.get("x-request-id").is_some());
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
}

#[tokio::test]
async fn metrics_expose_service_counters() {
    init_metrics();
    let app = TestApp::spawn();
    app.create_session("founder@atlas.example").await;

    let response = app.send(get_request("/metrics")).await;
    assert_eq!(response.status(), StatusCode::OK);

    use http_body_util::BodyExt;
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("readiness_sessions_created_total"));
}
