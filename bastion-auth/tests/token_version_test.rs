//! Bulk revocation through the token version.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn logout_all_revokes_every_session() {
    let app = TestApp::new();
    app.register("alice@example.com", "correct horse battery")
        .await;

    let (_, s1) = app.login("alice@example.com", "correct horse battery").await;
    let (_, s2) = app.login("alice@example.com", "correct horse battery").await;
    let t1 = s1["access_token"].as_str().unwrap();
    let t2 = s2["access_token"].as_str().unwrap();

    let (status, _) = app.post_auth("/api/auth/logout-all", t1, None).await;
    assert_eq!(status, StatusCode::OK);

    for token in [t1, t2] {
        let (status, _) = app.get_auth("/api/auth/me", token).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // A fresh login works and carries the new version.
    let (status, body) = app.login("alice@example.com", "correct horse battery").await;
    assert_eq!(status, StatusCode::OK);
    let fresh = body["access_token"].as_str().unwrap();
    let (status, _) = app.get_auth("/api/auth/me", fresh).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn change_password_revokes_old_tokens_and_returns_a_live_one() {
    let app = TestApp::new();
    let old_token = app
        .register("bob@example.com", "correct horse battery")
        .await;

    let (status, body) = app
        .put_auth(
            "/api/users/me/password",
            &old_token,
            json!({
                "current_password": "correct horse battery",
                "new_password": "fresh horse battery",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let new_token = body["access_token"].as_str().unwrap();

    let (status, _) = app.get_auth("/api/auth/me", &old_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get_auth("/api/auth/me", new_token).await;
    assert_eq!(status, StatusCode::OK);

    // Old password no longer signs in; the new one does.
    let (status, _) = app.login("bob@example.com", "correct horse battery").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.login("bob@example.com", "fresh horse battery").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn change_password_rejects_wrong_current_password() {
    let app = TestApp::new();
    let token = app
        .register("carol@example.com", "correct horse battery")
        .await;

    let (status, _) = app
        .put_auth(
            "/api/users/me/password",
            &token,
            json!({
                "current_password": "not the password",
                "new_password": "fresh horse battery",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Token is still valid: nothing was bumped.
    let (status, _) = app.get_auth("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
}
