//! One-time download link tests.
//!
//! Run with: `cargo test -p filegate-api --test download_test`

mod helpers;

use axum::http::StatusCode;
use helpers::auth::{test_user, upload, API_KEY_HEADER};
use helpers::setup_test_app;
use serde_json::Value;
use std::time::Duration;

async fn issue_token(app: &helpers::TestApp, user: &helpers::auth::TestUser, key: &str) -> String {
    let response = app
        .client()
        .get(&format!("/download/{}/token", key))
        .add_header(API_KEY_HEADER, user.credential.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_token_is_single_use() {
    let app = setup_test_app().await;
    let owner = test_user("emp-1", "acme");
    upload(app.client(), &owner, "docs/report.pdf", b"%PDF", "PRIVATE").await;

    let token = issue_token(&app, &owner, "docs/report.pdf").await;

    let response = app
        .client()
        .get("/download/docs/report.pdf")
        .add_query_param("token", &token)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.as_bytes().as_ref(), b"%PDF");

    let response = app
        .client()
        .get("/download/docs/report.pdf")
        .add_query_param("token", &token)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/download/anything.txt")
        .add_query_param("token", "not-a-token")
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bare_download_path_issues_token() {
    let app = setup_test_app().await;
    let owner = test_user("emp-1", "acme");
    upload(app.client(), &owner, "notes.txt", b"notes", "PRIVATE").await;

    let response = app.client().get("/download/notes.txt").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = app
        .client()
        .get("/download/notes.txt")
        .add_header(API_KEY_HEADER, owner.credential.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let token = body["token"].as_str().unwrap().to_string();

    let response = app
        .client()
        .get("/download/notes.txt")
        .add_query_param("token", &token)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.as_bytes().as_ref(), b"notes");
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = setup_test_app().await;
    let owner = test_user("emp-1", "acme");
    upload(app.client(), &owner, "short.txt", b"brief", "PRIVATE").await;

    let token = app
        .state
        .tokens
        .issue_with_ttl("short.txt", &owner.principal, 1)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2100)).await;

    let response = app
        .client()
        .get("/download/short.txt")
        .add_query_param("token", &token)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_for_another_key_is_not_found() {
    let app = setup_test_app().await;
    let owner = test_user("emp-1", "acme");
    upload(app.client(), &owner, "one.txt", b"1", "PRIVATE").await;
    upload(app.client(), &owner, "two.txt", b"2", "PRIVATE").await;

    let token = issue_token(&app, &owner, "one.txt").await;

    let response = app
        .client()
        .get("/download/two.txt")
        .add_query_param("token", &token)
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_issue_requires_credential_and_access() {
    let app = setup_test_app().await;
    let owner = test_user("emp-1", "acme");
    let colleague = test_user("emp-2", "acme");
    upload(app.client(), &owner, "mine.txt", b"private", "PRIVATE").await;

    let response = app.client().get("/download/mine.txt/token").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = app
        .client()
        .get("/download/mine.txt/token")
        .add_header(API_KEY_HEADER, colleague.credential.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = app
        .client()
        .get("/download/nothing.txt/token")
        .add_header(API_KEY_HEADER, owner.credential.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
