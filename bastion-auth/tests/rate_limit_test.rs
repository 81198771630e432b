//! Action rate limits on login and the reset endpoints.

mod common;

use axum::http::StatusCode;
use common::{test_config, TestApp};
use serde_json::json;

fn tight_config() -> bastion_auth::config::AuthConfig {
    let mut config = test_config();
    config.rate_limit.login_attempts = 3;
    config.rate_limit.reset_start_attempts = 2;
    config.rate_limit.reset_verify_attempts = 3;
    config
}

#[tokio::test]
async fn login_attempts_are_capped() {
    let app = TestApp::with_config(tight_config());
    app.register("alice@example.com", "correct horse battery")
        .await;

    for _ in 0..3 {
        let (status, _) = app.login("alice@example.com", "wrong password!").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // Attempt N+1 is refused before credentials are even checked.
    let (status, body) = app.login("alice@example.com", "correct horse battery").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("Too many"));
}

#[tokio::test]
async fn reset_start_is_capped_per_email() {
    let app = TestApp::with_config(tight_config());
    app.register("bob@example.com", "correct horse battery")
        .await;

    for _ in 0..2 {
        let (status, _) = app
            .post(
                "/api/auth/forgot-password/start",
                json!({ "email": "bob@example.com" }),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    let (status, _) = app
        .post(
            "/api/auth/forgot-password/start",
            json!({ "email": "bob@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Exactly two OTP emails went out.
    app.wait_for_deliveries(2).await;
    assert_eq!(app.email.sent_count(), 2);
}

#[tokio::test]
async fn reset_verify_guessing_is_capped() {
    let app = TestApp::with_config(tight_config());
    app.register("carol@example.com", "correct horse battery")
        .await;

    app.post(
        "/api/auth/forgot-password/start",
        json!({ "email": "carol@example.com" }),
    )
    .await;

    for _ in 0..3 {
        let (status, _) = app
            .post(
                "/api/auth/forgot-password/verify",
                json!({ "email": "carol@example.com", "otp": "000000" }),
            )
            .await;
        // Wrong guesses burn the allowance.
        assert!(
            status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED,
            "unexpected status {status}"
        );
    }

    let (status, _) = app
        .post(
            "/api/auth/forgot-password/verify",
            json!({ "email": "carol@example.com", "otp": "000000" }),
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn window_expiry_restores_allowance() {
    let app = TestApp::with_config(tight_config());
    app.register("dave@example.com", "correct horse battery")
        .await;

    for _ in 0..2 {
        app.post(
            "/api/auth/forgot-password/start",
            json!({ "email": "dave@example.com" }),
        )
        .await;
    }
    let (status, _) = app
        .post(
            "/api/auth/forgot-password/start",
            json!({ "email": "dave@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // Window rollover clears both counters.
    app.cache.expire_counter("reset_start:email:dave@example.com");
    app.cache.expire_counter("reset_start:addr:10.0.0.1");

    let (status, _) = app
        .post(
            "/api/auth/forgot-password/start",
            json!({ "email": "dave@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn retry_after_header_is_present() {
    let app = TestApp::with_config(tight_config());
    app.register("erin@example.com", "correct horse battery")
        .await;

    for _ in 0..3 {
        app.login("erin@example.com", "wrong password!").await;
    }

    // Raw request so the header is observable.
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "10.0.0.1")
        .body(Body::from(
            json!({ "email": "erin@example.com", "password": "whatever!" }).to_string(),
        ))
        .unwrap();

    let response = app.router_clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}
