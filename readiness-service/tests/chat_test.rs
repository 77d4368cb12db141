//! Chat initialization and chat turns over HTTP.

mod common;

use common::TestApp;
use readiness_service::services::SessionStore;
use serde_json::json;
use service_core::axum::http::StatusCode;
use uuid::Uuid;

#[tokio::test]
async fn init_creates_welcome_then_replays() {
    let app = TestApp::spawn();
    let (session_id, _) = app.create_session("founder@atlas.example").await;

    let (status, first) = app
        .post_json("/api/chat/init", json!({ "sessionId": session_id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["initialized"], true);
    assert_eq!(first["isExisting"], false);

    let messages = first["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "assistant");
    assert_eq!(messages[0]["seq"], 0);

    let writes = app.store.write_count();
    let (status, second) = app
        .post_json("/api/chat/init", json!({ "sessionId": session_id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["isExisting"], true);
    assert_eq!(second["messages"], first["messages"]);
    assert_eq!(app.store.write_count(), writes);

    let id: Uuid = session_id.parse().unwrap();
    let stored = app.store.find_session(id).await.unwrap().unwrap();
    assert_eq!(stored.status.as_str(), "in_progress");
}

#[tokio::test]
async fn init_unknown_session_is_not_found() {
    let app = TestApp::spawn();

    let (status, _) = app
        .post_json(
            "/api/chat/init",
            json!({ "sessionId": Uuid::new_v4().to_string() }),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn message_before_init_is_conflict() {
    let app = TestApp::spawn();
    let (session_id, _) = app.create_session("founder@atlas.example").await;

    let (status, body) = app
        .post_json(
            "/api/chat/message",
            json!({ "sessionId": session_id, "content": "Hello" }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Chat has not been initialized for this session");
}

#[tokio::test]
async fn message_turn_stores_user_and_assistant_messages() {
    let app = TestApp::spawn();
    let session_id = app.started_chat().await;

    let (status, body) = app
        .post_json(
            "/api/chat/message",
            json!({ "sessionId": session_id, "content": "We build scheduling software for dental clinics" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["seq"], 1);
    assert_eq!(
        messages[0]["content"],
        "We build scheduling software for dental clinics"
    );
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["seq"], 2);
    assert_eq!(body["currentDomain"], "market");

    let (_, replay) = app
        .post_json("/api/chat/init", json!({ "sessionId": session_id }))
        .await;
    assert_eq!(replay["messages"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn conversation_advances_through_domains() {
    let app = TestApp::spawn();
    let session_id = app.started_chat().await;

    let mut domain = String::new();
    for turn in 0..3 {
        let (status, body) = app
            .post_json(
                "/api/chat/message",
                json!({ "sessionId": session_id, "content": format!("Answer {}", turn) }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        domain = body["currentDomain"].as_str().unwrap().to_string();
    }

    assert_eq!(domain, "product");
}

#[tokio::test]
async fn blank_message_is_rejected_without_store_writes() {
    let app = TestApp::spawn();
    let session_id = app.started_chat().await;
    let writes = app.store.write_count();

    for content in ["", "   \n\t "] {
        let (status, _) = app
            .post_json(
                "/api/chat/message",
                json!({ "sessionId": session_id, "content": content }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, _) = app
        .post_json(
            "/api/chat/message",
            json!({ "sessionId": session_id, "content": "x".repeat(10_001) }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.store.write_count(), writes);
}

#[tokio::test]
async fn malformed_session_id_is_bad_request() {
    let app = TestApp::spawn();

    let (status, _) = app
        .post_json("/api/chat/init", json!({ "sessionId": "not-a-uuid" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_json(
            "/api/chat/message",
            json!({ "sessionId": "not-a-uuid", "content": "Hello" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.store.read_count(), 0);
    assert_eq!(app.store.write_count(), 0);
}

#[tokio::test]
async fn completed_session_rejects_messages() {
    let app = TestApp::spawn();
    let session_id = app.started_chat().await;

    let (status, _) = app
        .post_empty(&format!("/api/snapshot/{}", session_id))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post_json(
            "/api/chat/message",
            json!({ "sessionId": session_id, "content": "One more thing" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "This assessment is already completed");
}
