//! Bearer-token authentication.
//!
//! A token is accepted only when the signature verifies, its jti is not on
//! the deny-list, and its `tv` claim still matches the user's stored token
//! version. The loaded user rides along in request extensions.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use bastion_core::error::AppError;

use crate::models::User;
use crate::services::AccessClaims;
use crate::AppState;

/// Authenticated identity attached to the request.
#[derive(Clone)]
pub struct AuthUser {
    pub user: User,
    pub claims: AccessClaims,
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing bearer token")))?;

    let claims = state
        .auth
        .tokens()
        .verify_access_token(&token)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token")))?;

    if state
        .deny_list
        .is_denied(claims.jti)
        .await
        .map_err(AppError::from)?
    {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Token has been revoked"
        )));
    }

    let user = state
        .store
        .find_user_by_id(claims.sub)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Unknown user")))?;

    // A bump of the stored version revokes every token minted before it.
    if claims.tv != user.token_version {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Token has been revoked"
        )));
    }

    request.extensions_mut().insert(AuthUser { user, claims });
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.to_string())
}
