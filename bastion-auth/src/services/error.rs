use bastion_core::error::AppError;
use thiserror::Error;

/// Errors produced by the auth domain services.
///
/// Credential failures collapse into `InvalidCredentials` before they reach
/// a handler so responses never reveal whether an account exists.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Invalid verification code")]
    InvalidCode,

    #[error("Invalid or expired code")]
    InvalidOrExpiredOtp,

    #[error("Invalid or expired reset session")]
    InvalidOrExpiredResetToken,

    #[error("Too many attempts, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Not a member of this team")]
    NotAMember,

    #[error("Insufficient role for this operation")]
    InsufficientRole,

    #[error("Team not found")]
    TeamNotFound,

    #[error("Cannot delete a personal team")]
    PersonalTeamImmutable,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("User not found")]
    UserNotFound,

    #[error("Two-factor setup has not been started")]
    TotpNotEnrolled,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Email delivery error: {0}")]
    Email(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::TokenRevoked => {
                AppError::Unauthorized(anyhow::anyhow!("Token has been revoked"))
            }
            ServiceError::InvalidCode => AppError::Unauthorized(anyhow::anyhow!("Invalid code")),
            ServiceError::InvalidOrExpiredOtp => {
                AppError::BadRequest(anyhow::anyhow!("Invalid or expired code"))
            }
            ServiceError::InvalidOrExpiredResetToken => {
                AppError::BadRequest(anyhow::anyhow!("Invalid or expired reset session"))
            }
            ServiceError::RateLimited {
                retry_after_seconds,
            } => AppError::TooManyRequests(
                "Too many attempts, try again later".to_string(),
                Some(retry_after_seconds),
            ),
            ServiceError::NotAMember => AppError::Forbidden(anyhow::anyhow!("Not a team member")),
            ServiceError::InsufficientRole => {
                AppError::Forbidden(anyhow::anyhow!("Insufficient role"))
            }
            ServiceError::TeamNotFound => AppError::NotFound(anyhow::anyhow!("Team not found")),
            ServiceError::PersonalTeamImmutable => {
                AppError::BadRequest(anyhow::anyhow!("Personal teams cannot be deleted"))
            }
            ServiceError::EmailAlreadyRegistered => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
            ServiceError::TotpNotEnrolled => {
                AppError::BadRequest(anyhow::anyhow!("Two-factor setup has not been started"))
            }
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Cache(e) => AppError::InternalError(anyhow::anyhow!("Cache error: {e}")),
            ServiceError::Email(e) => AppError::EmailError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
