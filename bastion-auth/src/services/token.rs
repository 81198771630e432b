//! HS256 token issuance and verification.
//!
//! Every token carries the owner's `tv` (token version) claim so a bump of
//! the stored version revokes all outstanding tokens at once, and a `jti`
//! so individual tokens can be deny-listed on logout.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;

pub const RESET_SCOPE: &str = "pwd_reset";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        }
    }
}

/// Claims for an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id.
    pub sub: Uuid,
    pub email: String,
    /// Token version at issuance. Stale versions are rejected.
    pub tv: i32,
    pub exp: i64,
    pub iat: i64,
    pub jti: Uuid,
}

/// Claims for a single-use password reset session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: Uuid,
    /// Reset session record this token belongs to.
    pub rid: Uuid,
    pub tv: i32,
    pub scope: String,
    pub exp: i64,
    pub jti: Uuid,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_expiry: Duration,
    reset_expiry: Duration,
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_key.as_bytes()),
            access_expiry: Duration::minutes(config.access_token_expiry_minutes),
            reset_expiry: Duration::minutes(config.reset_token_expiry_minutes),
        }
    }

    pub fn access_expiry_seconds(&self) -> i64 {
        self.access_expiry.num_seconds()
    }

    pub fn reset_expiry_seconds(&self) -> i64 {
        self.reset_expiry.num_seconds()
    }

    /// Issue an access token bound to the user's current token version.
    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        email: &str,
        token_version: i32,
    ) -> Result<(String, AccessClaims), TokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id,
            email: email.to_string(),
            tv: token_version,
            exp: (now + self.access_expiry).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok((token, claims))
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<AccessClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    /// Issue a reset session token after OTP verification. The `jti` is
    /// persisted on the reset record and matched at confirm time, making the
    /// token single-use.
    pub fn issue_reset_token(
        &self,
        user_id: Uuid,
        reset_id: Uuid,
        token_version: i32,
    ) -> Result<(String, ResetClaims), TokenError> {
        let now = Utc::now();
        let claims = ResetClaims {
            sub: user_id,
            rid: reset_id,
            tv: token_version,
            scope: RESET_SCOPE.to_string(),
            exp: (now + self.reset_expiry).timestamp(),
            jti: Uuid::new_v4(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok((token, claims))
    }

    pub fn verify_reset_token(&self, token: &str) -> Result<ResetClaims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<ResetClaims>(token, &self.decoding_key, &validation)?;

        if data.claims.scope != RESET_SCOPE {
            return Err(TokenError::Invalid);
        }

        Ok(data.claims)
    }
}
