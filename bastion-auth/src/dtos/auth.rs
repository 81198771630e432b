use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::UserResponse;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    /// Required when the account has TOTP enabled.
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub totp_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordStartRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordVerifyRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub otp: String,
    /// Required when the account has TOTP enabled.
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub totp_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResetSessionResponse {
    pub reset_session_token: String,
    /// Seconds until the reset session expires.
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordConfirmRequest {
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub reset_session_token: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TwoFactorSetupResponse {
    /// Base32 secret to store in the authenticator app.
    pub secret: String,
    /// otpauth:// URI suitable for QR rendering by the client.
    pub provisioning_uri: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TwoFactorVerifyRequest {
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
}
