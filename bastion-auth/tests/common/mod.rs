//! Shared harness: the full router wired to in-memory store, cache and a
//! recording email provider, driven through tower::oneshot.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use bastion_auth::config::{
    AuthConfig, DatabaseConfig, Environment, JwtConfig, RateLimitConfig, RedisConfig,
    SecurityConfig, SmtpConfig, SwaggerConfig, SwaggerMode, TotpConfig,
};
use bastion_auth::services::{
    AuthService, AuthStore, MemoryCache, MemoryStore, MockEmailService, RateLimiter, TeamService,
    TokenDenyList, TokenService, TotpService,
};
use bastion_auth::{build_router, AppState};

pub fn test_config() -> AuthConfig {
    AuthConfig {
        common: bastion_core::config::Config { port: 8080 },
        environment: Environment::Dev,
        service_name: "bastion-auth-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "warn".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        redis: RedisConfig { url: String::new() },
        jwt: JwtConfig {
            secret_key: "integration-test-secret-key-0123456789".to_string(),
            access_token_expiry_minutes: 60,
            reset_token_expiry_minutes: 15,
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            user: String::new(),
            password: String::new(),
            from_address: "no-reply@localhost".to_string(),
        },
        totp: TotpConfig {
            issuer: "Bastion".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 900,
            reset_start_attempts: 100,
            reset_start_window_seconds: 900,
            reset_verify_attempts: 100,
            reset_verify_window_seconds: 900,
            otp_ttl_minutes: 10,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
        },
    }
}

pub struct TestApp {
    router: Router,
    pub email: Arc<MockEmailService>,
    pub cache: Arc<MemoryCache>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let email = Arc::new(MockEmailService::new());

        let store_dyn: Arc<dyn AuthStore> = store.clone();
        let deny_list: Arc<dyn TokenDenyList> = cache.clone();
        let limiter = RateLimiter::new(cache.clone(), config.rate_limit.clone());

        let auth = Arc::new(AuthService::new(
            store_dyn.clone(),
            deny_list.clone(),
            email.clone(),
            TokenService::new(&config.jwt),
            TotpService::new(config.totp.issuer.clone()),
            limiter,
            config.rate_limit.otp_ttl_minutes,
        ));
        let teams = Arc::new(TeamService::new(store_dyn.clone()));

        let state = AppState {
            auth,
            teams,
            store: store_dyn,
            deny_list,
            db: None,
            cache: None,
        };

        Self {
            router: build_router(state, &config),
            email,
            cache,
        }
    }

    pub fn router_clone(&self) -> Router {
        self.router.clone()
    }

    pub async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("x-forwarded-for", "10.0.0.1");

        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", path, None, Some(body)).await
    }

    pub async fn post_auth(
        &self,
        path: &str,
        token: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        self.request("POST", path, Some(token), body).await
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request("GET", path, Some(token), None).await
    }

    pub async fn put_auth(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request("PUT", path, Some(token), Some(body)).await
    }

    pub async fn delete_auth(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request("DELETE", path, Some(token), None).await
    }

    /// Register an account and return its access token.
    pub async fn register(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/register",
                serde_json::json!({
                    "email": email,
                    "password": password,
                    "name": "Test User",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post(
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// OTP delivery runs in a detached task; poll the recording provider
    /// until it has landed.
    pub async fn wait_for_otp(&self, email: &str) -> String {
        for _ in 0..100 {
            if let Some(otp) = self.email.last_otp_for(email) {
                return otp;
            }
            tokio::task::yield_now().await;
        }
        panic!("no OTP was delivered to {email}");
    }

    /// Wait until at least `n` emails have been recorded.
    pub async fn wait_for_deliveries(&self, n: usize) {
        for _ in 0..100 {
            if self.email.sent_count() >= n {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {n} deliveries, saw {}", self.email.sent_count());
    }
}
