//! User model - account identity, credentials and revocation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// User entity.
///
/// `token_version` is stamped into every issued JWT; bumping it revokes all
/// outstanding tokens at once. The TOTP secret is stored at enrollment but
/// 2FA only takes effect once `totp_enabled` is set by a confirmed code.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub token_version: i32,
    pub totp_secret: Option<String>,
    pub totp_enabled: bool,
    pub current_team_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl User {
    /// Create a new user with token version 1 and no 2FA.
    pub fn new(email: String, password_hash: String, name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: Uuid::new_v4(),
            email,
            name,
            password_hash,
            token_version: 1,
            totp_secret: None,
            totp_enabled: false,
            current_team_id: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Convert to sanitized response (no credential material).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// User response for API (without sensitive fields).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub totp_enabled: bool,
    pub current_team_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            user_id: u.user_id,
            email: u.email,
            name: u.name,
            totp_enabled: u.totp_enabled,
            current_team_id: u.current_team_id,
            created_utc: u.created_utc,
        }
    }
}
