// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::*;
use axum::http::StatusCode;
use leadrs::domain::models::session::SessionStatus;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

fn session_id(body: &Value) -> Uuid {
    body["sessionId"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health_and_version() {
    let app = create_test_app(Arc::new(ScriptedFetcher::default()), Some("Vodacom"));

    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "OK");

    let response = app.server.get("/v1/version").await;
    assert_eq!(response.text(), env!("CARGO_PKG_VERSION"));
}

/// 启动会话并轮询直到完成
#[tokio::test]
async fn test_start_and_poll_session() {
    let app = create_test_app(Arc::new(ScriptedFetcher::default()), Some("Vodacom"));

    let response = app
        .server
        .post("/v1/sessions")
        .json(&json!({
            "locations": ["Cape Town", "Durban"],
            "categories": ["plumbers"],
            "concurrency": { "simultaneousLocations": 2, "simultaneousCategories": 1 },
            "resolveProviders": true
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["status"], "running");
    assert_eq!(body["totalTasks"], 2);

    let id = session_id(&body);
    assert_eq!(app.wait_for_terminal(id).await, SessionStatus::Completed);

    let response = app.server.get(&format!("/v1/sessions/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let status: Value = response.json();
    assert_eq!(status["status"], "completed");
    assert_eq!(status["progress"], 100);
    assert_eq!(status["businesses"].as_array().unwrap().len(), 2);
    assert_eq!(status["providers"]["0686128512"], "Vodacom");
    assert!(status["completedAt"].is_string());
    assert!(status.get("errorMessage").is_none());
    assert!(status["logs"]
        .as_array()
        .unwrap()
        .iter()
        .any(|l| l["level"] == "success"));
}

#[tokio::test]
async fn test_start_validation_errors() {
    let app = create_test_app(Arc::new(ScriptedFetcher::default()), Some("Vodacom"));

    let response = app
        .server
        .post("/v1/sessions")
        .json(&json!({ "locations": [], "categories": ["plumbers"] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post("/v1/sessions")
        .json(&json!({ "locations": ["  "], "categories": ["plumbers"] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post("/v1/sessions")
        .json(&json!({
            "locations": ["Durban"],
            "categories": ["plumbers"],
            "concurrency": { "simultaneousLookups": 21 }
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("simultaneousLookups"));

    let response = app
        .server
        .post("/v1/sessions")
        .json(&json!({ "categories": ["plumbers"] }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    assert!(app.repo.is_empty());
}

#[tokio::test]
async fn test_control_endpoints() {
    let gate = Arc::new(Semaphore::new(0));
    let app = create_test_app(Arc::new(ScriptedFetcher::gated(gate.clone())), Some("Vodacom"));

    let response = app
        .server
        .post("/v1/sessions")
        .json(&json!({ "locations": ["Durban"], "categories": ["plumbers", "bakeries"] }))
        .await;
    let id = session_id(&response.json());

    let response = app.server.post(&format!("/v1/sessions/{}/pause", id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "status": "paused" }));

    let status: Value = app.server.get(&format!("/v1/sessions/{}", id)).await.json();
    assert_eq!(status["status"], "paused");

    let response = app.server.post(&format!("/v1/sessions/{}/resume", id)).await;
    assert_eq!(response.json::<Value>(), json!({ "status": "resumed" }));

    let response = app.server.post(&format!("/v1/sessions/{}/stop", id)).await;
    assert_eq!(
        response.json::<Value>(),
        json!({ "status": "stopped", "businessesCollected": 0 })
    );

    // Stopped is final
    let response = app.server.post(&format!("/v1/sessions/{}/resume", id)).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "stopped");

    gate.add_permits(10);
    assert_eq!(app.wait_for_terminal(id).await, SessionStatus::Stopped);
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let app = create_test_app(Arc::new(ScriptedFetcher::default()), Some("Vodacom"));
    let id = Uuid::new_v4();

    let response = app.server.get(&format!("/v1/sessions/{}", id)).await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    for action in ["pause", "resume", "stop"] {
        let response = app
            .server
            .post(&format!("/v1/sessions/{}/{}", id, action))
            .await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    let response = app.server.get("/v1/sessions/not-a-uuid").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_lookup_endpoint() {
    let app = create_test_app(Arc::new(ScriptedFetcher::default()), Some("MTN"));

    let response = app
        .server
        .post("/v1/lookup")
        .json(&json!({ "phoneNumber": "+27 68 612 8512" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({ "phoneNumber": "0686128512", "provider": "MTN" })
    );
}

#[tokio::test]
async fn test_lookup_unavailable_is_503() {
    let app = create_test_app(Arc::new(ScriptedFetcher::default()), None);

    let response = app
        .server
        .post("/v1/lookup")
        .json(&json!({ "phoneNumber": "0686128512" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}
