pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::{middleware as axum_middleware, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use bastion_core::middleware::rate_limit::{
    create_ip_rate_limiter, ip_rate_limit_middleware,
};
use bastion_core::middleware::security_headers::security_headers_middleware;
use bastion_core::middleware::tracing::request_id_middleware;

use crate::config::{AuthConfig, SwaggerMode};
use crate::services::{
    AuthService, AuthStore, Database, RedisService, TeamService, TokenDenyList,
};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub teams: Arc<TeamService>,
    pub store: Arc<dyn AuthStore>,
    pub deny_list: Arc<dyn TokenDenyList>,
    pub db: Option<Database>,
    pub cache: Option<RedisService>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::logout_all,
        handlers::auth::me,
        handlers::auth::change_password,
        handlers::auth::forgot_password_start,
        handlers::auth::forgot_password_verify,
        handlers::auth::forgot_password_confirm,
        handlers::auth::twofa_setup,
        handlers::auth::twofa_verify,
        handlers::teams::create_team,
        handlers::teams::list_teams,
        handlers::teams::get_team,
        handlers::teams::update_team,
        handlers::teams::delete_team,
        handlers::teams::add_member,
        handlers::teams::list_members,
        handlers::teams::update_member,
        handlers::teams::remove_member,
        handlers::teams::switch_team,
    ),
    components(schemas(
        dtos::ErrorResponse,
        dtos::MessageResponse,
        dtos::RegisterRequest,
        dtos::LoginRequest,
        dtos::TokenResponse,
        dtos::ForgotPasswordStartRequest,
        dtos::ForgotPasswordVerifyRequest,
        dtos::ForgotPasswordConfirmRequest,
        dtos::ResetSessionResponse,
        dtos::ChangePasswordRequest,
        dtos::TwoFactorSetupResponse,
        dtos::TwoFactorVerifyRequest,
        dtos::CreateTeamRequest,
        dtos::UpdateTeamRequest,
        dtos::AddMemberRequest,
        dtos::UpdateMemberRequest,
        dtos::TeamResponse,
        dtos::TeamMemberResponse,
        dtos::TeamListResponse,
        dtos::MemberListResponse,
        models::UserResponse,
        models::MemberRole,
        models::MemberStatus,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication and session control"),
        (name = "teams", description = "Team management"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    cache: &'static str,
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<HealthResponse> {
    let database = match &state.db {
        Some(db) => match db::health_check(db.pool()).await {
            Ok(()) => "up",
            Err(_) => "down",
        },
        None => "not configured",
    };
    let cache = match &state.cache {
        Some(redis) => match redis.ping().await {
            Ok(()) => "up",
            Err(_) => "down",
        },
        None => "not configured",
    };

    let status = if database == "down" || cache == "down" {
        "degraded"
    } else {
        "ok"
    };

    Json(HealthResponse {
        status,
        database,
        cache,
    })
}

/// Assemble the full application router.
pub fn build_router(state: AppState, config: &AuthConfig) -> Router {
    let protected = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/logout-all", post(handlers::auth::logout_all))
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/auth/2fa/setup", post(handlers::auth::twofa_setup))
        .route("/api/auth/2fa/verify", post(handlers::auth::twofa_verify))
        .route(
            "/api/users/me/password",
            put(handlers::auth::change_password),
        )
        .route(
            "/api/teams",
            post(handlers::teams::create_team).get(handlers::teams::list_teams),
        )
        .route(
            "/api/teams/:team_id",
            get(handlers::teams::get_team)
                .put(handlers::teams::update_team)
                .delete(handlers::teams::delete_team),
        )
        .route(
            "/api/teams/:team_id/members",
            post(handlers::teams::add_member).get(handlers::teams::list_members),
        )
        .route(
            "/api/teams/:team_id/members/:user_id",
            put(handlers::teams::update_member).delete(handlers::teams::remove_member),
        )
        .route("/api/teams/:team_id/switch", post(handlers::teams::switch_team))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    let public = Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route(
            "/api/auth/forgot-password/start",
            post(handlers::auth::forgot_password_start),
        )
        .route(
            "/api/auth/forgot-password/verify",
            post(handlers::auth::forgot_password_verify),
        )
        .route(
            "/api/auth/forgot-password/confirm",
            post(handlers::auth::forgot_password_confirm),
        );

    let mut router = Router::new().merge(public).merge(protected);

    if config.swagger.enabled == SwaggerMode::Public {
        router = router.merge(
            SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()),
        );
    }

    let global_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );

    router
        .layer(axum_middleware::from_fn_with_state(
            global_limiter,
            ip_rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &AuthConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ])
}
