mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn register_returns_token_and_personal_team() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/auth/register",
            json!({
                "email": "alice@example.com",
                "password": "correct horse battery",
                "name": "Alice",
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["access_token"].as_str().unwrap().contains('.'));
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert!(!body["user"]["current_team_id"].is_null());

    // The personal team is visible and marked as such.
    let token = body["access_token"].as_str().unwrap();
    let (status, teams) = app.get_auth("/api/teams", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(teams["teams"].as_array().unwrap().len(), 1);
    assert_eq!(teams["teams"][0]["personal_team"], true);
    assert_eq!(teams["teams"][0]["name"], "Alice's Team");
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = TestApp::new();
    app.register("bob@example.com", "correct horse battery")
        .await;

    let (status, _) = app
        .post(
            "/api/auth/register",
            json!({
                "email": "bob@example.com",
                "password": "another password!",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_with_valid_credentials() {
    let app = TestApp::new();
    app.register("carol@example.com", "correct horse battery")
        .await;

    let (status, body) = app.login("carol@example.com", "correct horse battery").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "carol@example.com");
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_identical() {
    let app = TestApp::new();
    app.register("dave@example.com", "correct horse battery")
        .await;

    let (status_wrong, body_wrong) = app.login("dave@example.com", "not the password").await;
    let (status_unknown, body_unknown) = app.login("nobody@example.com", "whatever pass").await;

    assert_eq!(status_wrong, StatusCode::UNAUTHORIZED);
    assert_eq!(status_unknown, StatusCode::UNAUTHORIZED);
    assert_eq!(body_wrong["error"], body_unknown["error"]);
}

#[tokio::test]
async fn me_requires_a_token() {
    let app = TestApp::new();
    let (status, _) = app.request("GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get_auth("/api/auth/me", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_sanitized_profile() {
    let app = TestApp::new();
    let token = app
        .register("erin@example.com", "correct horse battery")
        .await;

    let (status, body) = app.get_auth("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "erin@example.com");
    assert!(body.get("password_hash").is_none());
    assert!(body.get("totp_secret").is_none());
}

#[tokio::test]
async fn logout_revokes_only_the_presented_token() {
    let app = TestApp::new();
    app.register("frank@example.com", "correct horse battery")
        .await;

    let (_, first) = app.login("frank@example.com", "correct horse battery").await;
    let (_, second) = app.login("frank@example.com", "correct horse battery").await;
    let first_token = first["access_token"].as_str().unwrap();
    let second_token = second["access_token"].as_str().unwrap();

    let (status, _) = app.post_auth("/api/auth/logout", first_token, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get_auth("/api/auth/me", first_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The other session is untouched.
    let (status, _) = app.get_auth("/api/auth/me", second_token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new();
    let (status, body) = app.request("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn validation_errors_are_unprocessable() {
    let app = TestApp::new();

    let (status, _) = app
        .post(
            "/api/auth/register",
            json!({ "email": "not-an-email", "password": "correct horse battery" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .post(
            "/api/auth/register",
            json!({ "email": "ok@example.com", "password": "short" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
