//! API Integration Tests
//!
//! Drive the router over the in-memory ledger store with `oneshot`.

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware, Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use account_ledger::api::{self, middleware::identity_middleware, AppState};

mod common;

fn app() -> Router {
    let (_, store) = common::memory_store();
    api::create_router()
        .layer(middleware::from_fn(identity_middleware))
        .with_state(AppState::new(store, Duration::from_secs(5)))
}

async fn send(app: &Router, method: &str, uri: &str, user: Option<Uuid>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user {
        request = request.header("X-Request-User-Id", user_id.to_string());
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Register through the API, returning (user id, first account number)
async fn register(app: &Router, name: &str, email: &str) -> (Uuid, String) {
    let (status, json) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": name, "email": email, "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {json}");

    let user_id = json["user_id"].as_str().unwrap().parse().unwrap();
    let account_number = json["account_number"].as_str().unwrap().to_string();
    (user_id, account_number)
}

#[tokio::test]
async fn test_transfer_e2e() {
    let app = app();
    let (alice, a) = register(&app, "Alice", "alice@example.com").await;
    let (bob, b) = register(&app, "Bob", "bob@example.com").await;

    let (status, json) = send(
        &app,
        "POST",
        "/transactions",
        Some(alice),
        Some(json!({ "from_account": a, "to_account": b, "amount": 1000, "description": "Rent" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "transfer failed: {json}");
    assert_eq!(json["from_account"], a.as_str());
    assert_eq!(json["to_account"], b.as_str());
    assert_eq!(json["amount"], "1000");
    assert_eq!(json["type"], "transfer");
    assert_eq!(json["description"], "Rent");
    assert!(json["created_at"].is_string());

    let (status, json) = send(&app, "GET", "/accounts", Some(alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["balance"], "4000");

    let (_, json) = send(&app, "GET", "/accounts", Some(bob), None).await;
    assert_eq!(json[0]["balance"], "6000");

    let (status, json) = send(&app, "GET", &format!("/transactions/{b}"), Some(bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_transfer_error_mapping() {
    let app = app();
    let (alice, a) = register(&app, "Alice", "alice@example.com").await;
    let (bob, b) = register(&app, "Bob", "bob@example.com").await;

    let cases = [
        (alice, json!({ "from_account": a, "to_account": b, "amount": 6000 }), StatusCode::BAD_REQUEST, "insufficient_funds"),
        (alice, json!({ "from_account": a, "to_account": b, "amount": -5 }), StatusCode::BAD_REQUEST, "invalid_amount"),
        (alice, json!({ "from_account": a, "to_account": b, "amount": "abc" }), StatusCode::BAD_REQUEST, "invalid_amount"),
        (bob, json!({ "from_account": a, "to_account": b, "amount": 10 }), StatusCode::FORBIDDEN, "unauthorized"),
        (alice, json!({ "from_account": a, "to_account": "9999999999", "amount": 10 }), StatusCode::NOT_FOUND, "recipient_account_not_found"),
        (alice, json!({ "from_account": "9999999999", "to_account": b, "amount": 10 }), StatusCode::NOT_FOUND, "sender_account_not_found"),
        (alice, json!({ "from_account": a, "to_account": a, "amount": 10 }), StatusCode::BAD_REQUEST, "same_account_transfer"),
        (alice, json!({ "from_account": a, "to_account": "123", "amount": 10 }), StatusCode::BAD_REQUEST, "invalid_request"),
    ];

    for (caller, body, expected_status, expected_code) in cases {
        let (status, json) = send(&app, "POST", "/transactions", Some(caller), Some(body.clone())).await;
        assert_eq!(status, expected_status, "{body}: {json}");
        assert_eq!(json["error_code"], expected_code, "{body}");
    }

    // Nothing moved
    let (_, json) = send(&app, "GET", "/accounts", Some(alice), None).await;
    assert_eq!(json[0]["balance"], "5000");
    let (_, json) = send(&app, "GET", "/transactions", Some(alice), None).await;
    assert_eq!(json, json!([]));
}

#[tokio::test]
async fn test_caller_is_required() {
    let app = app();

    let (status, json) = send(&app, "GET", "/transactions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error_code"], "unauthenticated");

    let (status, _) = send(&app, "POST", "/accounts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_account_creation_limit() {
    let app = app();
    let (alice, _) = register(&app, "Alice", "alice@example.com").await;

    for _ in 0..3 {
        let (status, json) = send(&app, "POST", "/accounts", Some(alice), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["balance"], "5000");
    }

    let (status, json) = send(&app, "POST", "/accounts", Some(alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "account_limit_exceeded");

    let (_, json) = send(&app, "GET", "/accounts", Some(alice), None).await;
    let numbers: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["account_number"].as_str().unwrap())
        .collect();
    assert_eq!(numbers.len(), 4);
    assert!(numbers.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_history_of_foreign_account_is_not_found() {
    let app = app();
    let (alice, a) = register(&app, "Alice", "alice@example.com").await;
    let (_, b) = register(&app, "Bob", "bob@example.com").await;

    let (status, _) = send(&app, "GET", &format!("/transactions/{b}"), Some(alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &format!("/transactions/{a}"), Some(alice), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/transactions/12ab", Some(alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_and_login() {
    let app = app();
    let (alice, a) = register(&app, "Alice", "alice@example.com").await;

    let (status, json) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "Alice Again", "email": "alice@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error_code"], "email_already_registered");

    let (status, _) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "Weak", "email": "weak@example.com", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user_id"], alice.to_string());
    assert_eq!(json["account_numbers"], json!([a]));
    assert!(json.get("password_hash").is_none());

    let (status, json) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "wrong123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error_code"], "invalid_credentials");
}

#[tokio::test]
async fn test_account_owner_lookup() {
    let app = app();
    let (_, a) = register(&app, "Alice", "alice@example.com").await;

    let (status, json) = send(&app, "GET", &format!("/accounts/{a}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["owner_name"], "Alice");

    let (status, json) = send(&app, "GET", "/accounts/0000000000", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error_code"], "account_not_found");

    let (status, _) = send(&app, "GET", "/accounts/abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_user_header_is_rejected() {
    let app = app();
    let request = Request::builder()
        .uri("/accounts")
        .header("X-Request-User-Id", "not-a-uuid")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
