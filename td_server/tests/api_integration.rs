//! Integration tests for the HTTP API over in-memory infrastructure.
//!
//! Covers status mapping of domain errors, the request id header, and the
//! asynchronous registration and timer flows once background consumers run.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::time::Duration;
use td_server::{ServerConfig, Services, api};
use tokio::sync::watch;
use tower::ServiceExt; // For `oneshot` method

/// Helper to create the router and the services behind it
fn create_test_server() -> (axum::Router, Services) {
    let services = Services::in_memory(&ServerConfig::default());
    let app = api::create_router(services.app_state());
    (app, services)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_tournament(app: &axum::Router, name: &str) -> i64 {
    let (status, body) = send(app, "POST", "/tournaments", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let (app, _) = create_test_server();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["backend"], "memory");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _) = create_test_server();

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-42")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "trace-42");
}

// ============================================================================
// Tournament Tests
// ============================================================================

#[tokio::test]
async fn test_create_and_get_tournament() {
    let (app, _) = create_test_server();

    let (status, body) = send(
        &app,
        "POST",
        "/tournaments",
        Some(json!({ "name": "Sunday Major", "levelDurationMs": 60000 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "OPEN_REGISTRATION");
    assert_eq!(body["levelDurationMs"], 60000);
    assert_eq!(body["blinds"]["smallBlind"], 25);

    let id = body["id"].as_i64().unwrap();
    let (status, body) = send(&app, "GET", &format!("/tournaments/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Sunday Major");

    let (status, body) = send(&app, "GET", "/tournaments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_blank_name_is_bad_request() {
    let (app, _) = create_test_server();

    let (status, body) = send(&app, "POST", "/tournaments", Some(json!({ "name": "  " }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_NAME");
}

#[tokio::test]
async fn test_unknown_tournament_is_not_found() {
    let (app, _) = create_test_server();

    let (status, body) = send(&app, "GET", "/tournaments/999", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_second_start_conflicts() {
    let (app, _) = create_test_server();
    let id = create_tournament(&app, "Turbo").await;

    let (status, body) = send(&app, "POST", &format!("/tournaments/{id}/start"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "RUNNING");
    assert_eq!(body["currentLevel"], 1);

    let (status, body) = send(&app, "POST", &format!("/tournaments/{id}/start"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "ALREADY_STARTED");
}

#[tokio::test]
async fn test_advance_blind_level() {
    let (app, _) = create_test_server();
    let id = create_tournament(&app, "Deepstack").await;
    send(&app, "POST", &format!("/tournaments/{id}/start"), None).await;

    let (status, body) = send(&app, "POST", &format!("/tournaments/{id}/next"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currentLevel"], 2);

    let (status, body) = send(&app, "GET", &format!("/tournaments/{id}/blind"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["level"], 2);
    assert_eq!(body["smallBlind"], 50);
    assert_eq!(body["bigBlind"], 100);
}

#[tokio::test]
async fn test_advance_before_start_conflicts() {
    let (app, _) = create_test_server();
    let id = create_tournament(&app, "Early").await;

    let (status, body) = send(&app, "POST", &format!("/tournaments/{id}/next"), None).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "NOT_RUNNING");
}

// ============================================================================
// Player Tests
// ============================================================================

#[tokio::test]
async fn test_eliminate_before_start_conflicts() {
    let (app, _) = create_test_server();
    let id = create_tournament(&app, "Freeroll").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/tournaments/{id}/players/1/eliminate"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "TOURNAMENT_NOT_STARTED");
}

#[tokio::test]
async fn test_registration_after_start_is_closed() {
    let (app, _) = create_test_server();
    let id = create_tournament(&app, "Late Reg").await;
    send(&app, "POST", &format!("/tournaments/{id}/start"), None).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/tournaments/{id}/players"),
        Some(json!({ "username": "alice" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "REGISTRATION_CLOSED");
}

#[tokio::test]
async fn test_blank_username_is_bad_request() {
    let (app, _) = create_test_server();
    let id = create_tournament(&app, "Open").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/tournaments/{id}/players"),
        Some(json!({ "username": "   " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_USERNAME");
}

#[tokio::test]
async fn test_registration_seats_player_in_background() {
    let (app, services) = create_test_server();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = services.spawn_background(shutdown_rx).await.unwrap();

    let id = create_tournament(&app, "Saturday").await;
    let (status, body) = send(
        &app,
        "POST",
        &format!("/tournaments/{id}/players"),
        Some(json!({ "username": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body["eventId"].is_string());

    let uri = format!("/tournaments/{id}/players");
    let players = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (_, body) = send(&app, "GET", &uri, None).await;
            if body[0]["status"] == "SEATED" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(players.as_array().unwrap().len(), 1);
    assert_eq!(players[0]["username"], "alice");

    let (status, tables) = send(&app, "GET", &format!("/tournaments/{id}/tables"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tables.as_array().unwrap().len(), 1);
    assert_eq!(tables[0]["seatedPlayers"][0]["username"], "alice");

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }
}

// ============================================================================
// Table Tests
// ============================================================================

#[tokio::test]
async fn test_create_tables() {
    let (app, _) = create_test_server();
    let id = create_tournament(&app, "Satellite").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/tournaments/{id}/tables"),
        Some(json!({ "count": 3 })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_zero_tables_is_bad_request() {
    let (app, _) = create_test_server();
    let id = create_tournament(&app, "Satellite").await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/tournaments/{id}/tables"),
        Some(json!({ "count": 0 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_COUNT");
}

// ============================================================================
// Timer Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_timer_is_not_found() {
    let (app, _) = create_test_server();

    let (status, body) = send(&app, "GET", "/tournaments/42/timer", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "TIMER_NOT_FOUND");

    let (status, body) = send(&app, "POST", "/timers/42/pause", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "TIMER_NOT_FOUND");
}

#[tokio::test]
async fn test_start_creates_timer_in_background() {
    let (app, services) = create_test_server();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = services.spawn_background(shutdown_rx).await.unwrap();

    let (_, body) = send(
        &app,
        "POST",
        "/tournaments",
        Some(json!({ "name": "Timed", "levelDurationMs": 600000 })),
    )
    .await;
    let id = body["id"].as_i64().unwrap();
    send(&app, "POST", &format!("/tournaments/{id}/start"), None).await;

    let uri = format!("/tournaments/{id}/timer");
    let timer = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (status, body) = send(&app, "GET", &uri, None).await;
            if status == StatusCode::OK {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(timer["status"], "RUNNING");
    let remaining = timer["remainingMs"].as_i64().unwrap();
    assert!(remaining > 0 && remaining <= 600000);

    let (status, body) = send(&app, "POST", &format!("/timers/{id}/pause"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PAUSED");

    let (status, body) = send(&app, "POST", &format!("/timers/{id}/resume"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "RUNNING");

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }
}

// ============================================================================
// WebSocket Tests
// ============================================================================

#[tokio::test]
async fn test_websocket_requires_upgrade() {
    let (app, _) = create_test_server();

    let request = Request::builder()
        .uri("/ws/timers/1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
}
