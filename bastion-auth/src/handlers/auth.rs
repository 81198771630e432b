//! Auth endpoints.
//!
//! Reset-start and login keep their responses uniform regardless of whether
//! the account exists.

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use bastion_core::error::AppError;
use std::net::SocketAddr;

use crate::dtos::{
    ChangePasswordRequest, ErrorResponse, ForgotPasswordConfirmRequest,
    ForgotPasswordStartRequest, ForgotPasswordVerifyRequest, LoginRequest, MessageResponse,
    RegisterRequest, ResetSessionResponse, TokenResponse, TwoFactorSetupResponse,
    TwoFactorVerifyRequest,
};
use crate::middleware::AuthUser;
use crate::models::UserResponse;
use crate::services::IssuedToken;
use crate::utils::ValidatedJson;
use crate::AppState;

use super::client_addr;

const RESET_STARTED_MESSAGE: &str = "If the email exists, a verification code has been sent.";

fn token_response(issued: IssuedToken) -> TokenResponse {
    TokenResponse {
        access_token: issued.access_token,
        token_type: "Bearer".to_string(),
        expires_in: issued.expires_in,
        user: issued.user.sanitized(),
    }
}

/// Register a new account.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = TokenResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let issued = state
        .auth
        .register(&req.email, &req.password, req.name)
        .await?;
    Ok((StatusCode::CREATED, Json(token_response(issued))))
}

/// Sign in with email, password and, when enabled, a TOTP code.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let addr = client_addr(&headers, connect_info.as_ref());
    let issued = state
        .auth
        .login(&req.email, &req.password, req.totp_code.as_deref(), &addr)
        .await?;
    Ok(Json(token_response(issued)))
}

/// Revoke the presented token.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Token revoked", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.logout(&auth_user.claims).await?;
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// Revoke every outstanding token for the account.
#[utoipa::path(
    post,
    path = "/api/auth/logout-all",
    responses(
        (status = 200, description = "All sessions revoked", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.logout_all(auth_user.user.user_id).await?;
    Ok(Json(MessageResponse {
        message: "All sessions revoked".to_string(),
    }))
}

/// Current account profile.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(auth_user.user.sanitized()))
}

/// Change the password while signed in. Returns a fresh token; all others
/// are revoked.
#[utoipa::path(
    put,
    path = "/api/users/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = TokenResponse),
        (status = 401, description = "Wrong current password", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let issued = state
        .auth
        .change_password(
            auth_user.user.user_id,
            &req.current_password,
            &req.new_password,
        )
        .await?;
    Ok(Json(token_response(issued)))
}

/// Open a password reset session. The response is the same whether or not
/// the email is registered.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password/start",
    request_body = ForgotPasswordStartRequest,
    responses(
        (status = 202, description = "Accepted", body = MessageResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn forgot_password_start(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordStartRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let addr = client_addr(&headers, connect_info.as_ref());
    state.auth.reset_start(&req.email, &addr).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: RESET_STARTED_MESSAGE.to_string(),
        }),
    ))
}

/// Exchange the emailed OTP (and TOTP when enabled) for a single-use reset
/// session token.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password/verify",
    request_body = ForgotPasswordVerifyRequest,
    responses(
        (status = 200, description = "OTP accepted", body = ResetSessionResponse),
        (status = 400, description = "Invalid or expired code", body = ErrorResponse),
        (status = 429, description = "Too many attempts", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn forgot_password_verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordVerifyRequest>,
) -> Result<Json<ResetSessionResponse>, AppError> {
    let addr = client_addr(&headers, connect_info.as_ref());
    let session = state
        .auth
        .reset_verify(&req.email, &req.otp, req.totp_code.as_deref(), &addr)
        .await?;
    Ok(Json(ResetSessionResponse {
        reset_session_token: session.token,
        expires_in: session.expires_in,
    }))
}

/// Complete the reset. Consumes the session and revokes every token.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password/confirm",
    request_body = ForgotPasswordConfirmRequest,
    responses(
        (status = 200, description = "Password replaced", body = MessageResponse),
        (status = 400, description = "Invalid or expired reset session", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn forgot_password_confirm(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordConfirmRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .auth
        .reset_confirm(&req.reset_session_token, &req.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset".to_string(),
    }))
}

/// Start TOTP enrollment. 2FA stays off until a code is verified.
#[utoipa::path(
    post,
    path = "/api/auth/2fa/setup",
    responses(
        (status = 200, description = "Enrollment secret", body = TwoFactorSetupResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn twofa_setup(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<TwoFactorSetupResponse>, AppError> {
    let enrollment = state.auth.totp_setup(auth_user.user.user_id).await?;
    Ok(Json(TwoFactorSetupResponse {
        secret: enrollment.secret,
        provisioning_uri: enrollment.provisioning_uri,
    }))
}

/// Confirm enrollment with a current code and enable 2FA.
#[utoipa::path(
    post,
    path = "/api/auth/2fa/verify",
    request_body = TwoFactorVerifyRequest,
    responses(
        (status = 200, description = "Two-factor enabled", body = MessageResponse),
        (status = 401, description = "Invalid code", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn twofa_verify(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<TwoFactorVerifyRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .auth
        .totp_verify(auth_user.user.user_id, &req.code)
        .await?;
    Ok(Json(MessageResponse {
        message: "Two-factor authentication enabled".to_string(),
    }))
}
