//! The three-phase reset exchange: start, verify, confirm.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

async fn start_reset(app: &TestApp, email: &str) -> String {
    let (status, body) = app
        .post("/api/auth/forgot-password/start", json!({ "email": email }))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED, "start failed: {body}");
    app.wait_for_otp(email).await
}

async fn verify_otp(app: &TestApp, email: &str, otp: &str) -> (StatusCode, serde_json::Value) {
    app.post(
        "/api/auth/forgot-password/verify",
        json!({ "email": email, "otp": otp }),
    )
    .await
}

#[tokio::test]
async fn full_reset_flow_replaces_password_and_revokes_sessions() {
    let app = TestApp::new();
    let session_token = app
        .register("alice@example.com", "correct horse battery")
        .await;

    let otp = start_reset(&app, "alice@example.com").await;

    let (status, body) = verify_otp(&app, "alice@example.com", &otp).await;
    assert_eq!(status, StatusCode::OK);
    let reset_token = body["reset_session_token"].as_str().unwrap();

    let (status, _) = app
        .post(
            "/api/auth/forgot-password/confirm",
            json!({
                "reset_session_token": reset_token,
                "new_password": "fresh horse battery",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Every pre-reset session is dead.
    let (status, _) = app.get_auth("/api/auth/me", &session_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.login("alice@example.com", "correct horse battery").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.login("alice@example.com", "fresh horse battery").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn start_is_uniform_for_unknown_emails() {
    let app = TestApp::new();
    app.register("bob@example.com", "correct horse battery")
        .await;

    let (status_known, body_known) = app
        .post(
            "/api/auth/forgot-password/start",
            json!({ "email": "bob@example.com" }),
        )
        .await;
    let (status_unknown, body_unknown) = app
        .post(
            "/api/auth/forgot-password/start",
            json!({ "email": "ghost@example.com" }),
        )
        .await;

    assert_eq!(status_known, StatusCode::ACCEPTED);
    assert_eq!(status_unknown, StatusCode::ACCEPTED);
    assert_eq!(body_known["message"], body_unknown["message"]);

    // Only the real account got mail.
    app.wait_for_otp("bob@example.com").await;
    assert!(app.email.last_otp_for("ghost@example.com").is_none());
}

#[tokio::test]
async fn wrong_otp_is_rejected_and_counted() {
    let app = TestApp::new();
    app.register("carol@example.com", "correct horse battery")
        .await;

    let otp = start_reset(&app, "carol@example.com").await;
    let wrong = if otp == "000000" { "111111" } else { "000000" };

    let (status, _) = verify_otp(&app, "carol@example.com", wrong).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The right code still works afterwards.
    let (status, _) = verify_otp(&app, "carol@example.com", &otp).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn otp_is_single_use() {
    let app = TestApp::new();
    app.register("dave@example.com", "correct horse battery")
        .await;

    let otp = start_reset(&app, "dave@example.com").await;

    let (status, _) = verify_otp(&app, "dave@example.com", &otp).await;
    assert_eq!(status, StatusCode::OK);

    // Session moved past `requested`; the same code buys nothing.
    let (status, _) = verify_otp(&app, "dave@example.com", &otp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_token_is_single_use() {
    let app = TestApp::new();
    app.register("erin@example.com", "correct horse battery")
        .await;

    let otp = start_reset(&app, "erin@example.com").await;
    let (_, body) = verify_otp(&app, "erin@example.com", &otp).await;
    let reset_token = body["reset_session_token"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(
            "/api/auth/forgot-password/confirm",
            json!({
                "reset_session_token": reset_token,
                "new_password": "fresh horse battery",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            "/api/auth/forgot-password/confirm",
            json!({
                "reset_session_token": reset_token,
                "new_password": "sneaky other password",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Only the first confirm took effect.
    let (status, _) = app.login("erin@example.com", "fresh horse battery").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn garbage_reset_token_is_rejected() {
    let app = TestApp::new();

    let (status, _) = app
        .post(
            "/api/auth/forgot-password/confirm",
            json!({
                "reset_session_token": "not.a.token",
                "new_password": "fresh horse battery",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn access_token_cannot_confirm_a_reset() {
    let app = TestApp::new();
    let access_token = app
        .register("frank@example.com", "correct horse battery")
        .await;

    let (status, _) = app
        .post(
            "/api/auth/forgot-password/confirm",
            json!({
                "reset_session_token": access_token,
                "new_password": "fresh horse battery",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn version_bump_after_verify_invalidates_the_reset_session() {
    let app = TestApp::new();
    app.register("grace@example.com", "correct horse battery")
        .await;

    let otp = start_reset(&app, "grace@example.com").await;
    let (_, body) = verify_otp(&app, "grace@example.com", &otp).await;
    let reset_token = body["reset_session_token"].as_str().unwrap().to_string();

    // Password change in between bumps the version the reset token froze.
    let (_, login) = app.login("grace@example.com", "correct horse battery").await;
    let session = login["access_token"].as_str().unwrap();
    let (status, _) = app
        .put_auth(
            "/api/users/me/password",
            session,
            json!({
                "current_password": "correct horse battery",
                "new_password": "interim horse battery",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            "/api/auth/forgot-password/confirm",
            json!({
                "reset_session_token": reset_token,
                "new_password": "attacker horse battery",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
