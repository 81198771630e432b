//! Core auth flows: registration, login, logout, password change and the
//! three-phase reset exchange.
//!
//! Every credential failure on login and reset collapses into the same
//! error so responses never reveal whether an account exists or which
//! factor failed.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{MemberRole, PasswordReset, Team, TeamMember, User};
use crate::utils::{generate_otp, hash_otp, verify_otp};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

use super::email::EmailProvider;
use super::error::ServiceError;
use super::rate_limit::{Action, RateLimiter};
use super::redis::TokenDenyList;
use super::store::AuthStore;
use super::token::{AccessClaims, ResetClaims, TokenService};
use super::totp::{Enrollment, TotpService};

pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: i64,
    pub user: User,
}

pub struct ResetSession {
    pub token: String,
    pub expires_in: i64,
}

pub struct AuthService {
    store: Arc<dyn AuthStore>,
    deny_list: Arc<dyn TokenDenyList>,
    email: Arc<dyn EmailProvider>,
    tokens: TokenService,
    totp: TotpService,
    limiter: RateLimiter,
    otp_ttl_minutes: i64,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        deny_list: Arc<dyn TokenDenyList>,
        email: Arc<dyn EmailProvider>,
        tokens: TokenService,
        totp: TotpService,
        limiter: RateLimiter,
        otp_ttl_minutes: i64,
    ) -> Self {
        Self {
            store,
            deny_list,
            email,
            tokens,
            totp,
            limiter,
            otp_ttl_minutes,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create the account and its personal team atomically, then sign the
    /// user in.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<IssuedToken, ServiceError> {
        let hash = hash_password(&Password::new(password.to_string()))?;
        let mut user = User::new(email.to_lowercase(), hash.into_string(), name);

        let display_name = user.name.as_deref().unwrap_or(&user.email).to_string();
        let team = Team::personal_for(user.user_id, &display_name);
        let member = TeamMember::new(team.team_id, user.user_id, MemberRole::Admin, None);

        self.store
            .create_user_with_personal_team(&user, &team, &member)
            .await?;
        user.current_team_id = Some(team.team_id);

        tracing::info!(user_id = %user.user_id, "user registered");
        self.issue(user)
    }

    /// Verify credentials and, when 2FA is enabled, the TOTP code. Any
    /// failure maps to `InvalidCredentials`.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        totp_code: Option<&str>,
        client_addr: &str,
    ) -> Result<IssuedToken, ServiceError> {
        self.limiter.allow(Action::Login, email, client_addr).await?;

        let user = self
            .store
            .find_user_by_email(&email.to_lowercase())
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        verify_password(
            &Password::new(password.to_string()),
            &PasswordHashString::new(user.password_hash.clone()),
        )
        .map_err(|_| ServiceError::InvalidCredentials)?;

        if user.totp_enabled {
            let secret = user
                .totp_secret
                .as_deref()
                .ok_or(ServiceError::InvalidCredentials)?;
            let code = totp_code.ok_or(ServiceError::InvalidCredentials)?;
            if !self.totp.verify(secret, code)? {
                return Err(ServiceError::InvalidCredentials);
            }
        }

        tracing::info!(user_id = %user.user_id, "login succeeded");
        self.issue(user)
    }

    /// Revoke the presented token only, by deny-listing its jti until the
    /// token would have expired anyway.
    pub async fn logout(&self, claims: &AccessClaims) -> Result<(), ServiceError> {
        let remaining = claims.exp - Utc::now().timestamp();
        self.deny_list.deny(claims.jti, remaining).await?;
        tracing::info!(user_id = %claims.sub, "token revoked");
        Ok(())
    }

    /// Revoke every outstanding token for the user by bumping the stored
    /// token version.
    pub async fn logout_all(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let version = self.store.bump_token_version(user_id).await?;
        tracing::info!(user_id = %user_id, token_version = version, "all sessions revoked");
        Ok(())
    }

    /// Change the password for a signed-in user. Bumps the token version,
    /// so the returned token is the only one left standing.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<IssuedToken, ServiceError> {
        let mut user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        verify_password(
            &Password::new(current_password.to_string()),
            &PasswordHashString::new(user.password_hash.clone()),
        )
        .map_err(|_| ServiceError::InvalidCredentials)?;

        let hash = hash_password(&Password::new(new_password.to_string()))?;
        let version = self
            .store
            .update_password_and_bump_version(user_id, hash.as_str())
            .await?;

        user.password_hash = hash.into_string();
        user.token_version = version;

        tracing::info!(user_id = %user_id, "password changed");
        self.issue(user)
    }

    /// Phase 1 of the reset exchange. Always succeeds from the caller's
    /// point of view; an OTP is generated and mailed only when the account
    /// exists.
    pub async fn reset_start(&self, email: &str, client_addr: &str) -> Result<(), ServiceError> {
        self.limiter
            .allow(Action::ResetStart, email, client_addr)
            .await?;

        let email = email.to_lowercase();
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            tracing::debug!("reset requested for unknown email");
            return Ok(());
        };

        let otp = generate_otp();
        let reset = PasswordReset::new(
            user.user_id,
            email.clone(),
            hash_otp(&otp),
            self.otp_ttl_minutes,
            user.totp_enabled,
        );
        self.store.create_reset(&reset).await?;

        // Delivery is detached from the request path; a relay failure must
        // never change the response the caller sees.
        let provider = self.email.clone();
        let user_id = user.user_id;
        tokio::spawn(async move {
            if let Err(e) = provider.send_reset_otp(&email, &otp).await {
                tracing::warn!(user_id = %user_id, "reset OTP delivery failed: {e}");
            }
        });

        tracing::info!(user_id = %user.user_id, reset_id = %reset.reset_id, "reset session opened");
        Ok(())
    }

    /// Phase 2. Checks the OTP (and TOTP when the account had 2FA enabled
    /// at request time), then advances the session and hands out a
    /// single-use reset token.
    pub async fn reset_verify(
        &self,
        email: &str,
        otp: &str,
        totp_code: Option<&str>,
        client_addr: &str,
    ) -> Result<ResetSession, ServiceError> {
        self.limiter
            .allow(Action::ResetVerify, email, client_addr)
            .await?;

        let email = email.to_lowercase();
        let reset = self
            .store
            .find_requested_reset(&email)
            .await?
            .ok_or(ServiceError::InvalidOrExpiredOtp)?;

        if !reset.otp_usable() {
            return Err(ServiceError::InvalidOrExpiredOtp);
        }

        if !verify_otp(otp, &reset.otp_hash) {
            self.store.increment_reset_attempts(reset.reset_id).await?;
            return Err(ServiceError::InvalidOrExpiredOtp);
        }

        let user = self
            .store
            .find_user_by_id(reset.user_id)
            .await?
            .ok_or(ServiceError::InvalidOrExpiredOtp)?;

        // 2FA requirement is the snapshot taken when the reset was opened.
        if reset.require_totp {
            let secret = user
                .totp_secret
                .as_deref()
                .ok_or(ServiceError::InvalidOrExpiredOtp)?;
            let code = totp_code.ok_or(ServiceError::InvalidCode)?;
            if !self.totp.verify(secret, code)? {
                self.store.increment_reset_attempts(reset.reset_id).await?;
                return Err(ServiceError::InvalidCode);
            }
        }

        let (token, claims) = self
            .tokens
            .issue_reset_token(user.user_id, reset.reset_id, user.token_version)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e)))?;

        // CAS from `requested`; a concurrent verify that won first makes
        // this one lose.
        if !self
            .store
            .mark_otp_verified(reset.reset_id, claims.jti)
            .await?
        {
            return Err(ServiceError::InvalidOrExpiredOtp);
        }

        tracing::info!(user_id = %user.user_id, reset_id = %reset.reset_id, "otp verified");
        Ok(ResetSession {
            token,
            expires_in: self.tokens.reset_expiry_seconds(),
        })
    }

    /// Phase 3. Consumes the reset session exactly once, replaces the
    /// password and revokes every outstanding token.
    pub async fn reset_confirm(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let claims: ResetClaims = self
            .tokens
            .verify_reset_token(reset_token)
            .map_err(|_| ServiceError::InvalidOrExpiredResetToken)?;

        let user = self
            .store
            .find_user_by_id(claims.sub)
            .await?
            .ok_or(ServiceError::InvalidOrExpiredResetToken)?;

        // A version bump after issuance (password change, logout-all)
        // invalidates the reset session too.
        if claims.tv != user.token_version {
            return Err(ServiceError::InvalidOrExpiredResetToken);
        }

        // Single-use: the CAS only succeeds for the jti stored at verify
        // time, and only once. The password replace and version bump ride
        // the same store operation, so a losing CAS leaves the account
        // untouched.
        let hash = hash_password(&Password::new(new_password.to_string()))?;
        let consumed = self
            .store
            .complete_reset(claims.rid, claims.jti, hash.as_str())
            .await?
            .ok_or(ServiceError::InvalidOrExpiredResetToken)?;

        tracing::info!(user_id = %consumed.user_id, reset_id = %consumed.reset_id, "reset completed");
        Ok(())
    }

    /// Store a fresh TOTP secret without enabling 2FA yet.
    pub async fn totp_setup(&self, user_id: Uuid) -> Result<Enrollment, ServiceError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let enrollment = self.totp.enroll(&user.email)?;
        self.store
            .set_totp_secret(user_id, &enrollment.secret)
            .await?;

        tracing::info!(user_id = %user_id, "totp enrollment started");
        Ok(enrollment)
    }

    /// Enable 2FA once the user proves possession of the secret.
    pub async fn totp_verify(&self, user_id: Uuid, code: &str) -> Result<(), ServiceError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let secret = user
            .totp_secret
            .as_deref()
            .ok_or(ServiceError::TotpNotEnrolled)?;

        if !self.totp.verify(secret, code)? {
            return Err(ServiceError::InvalidCode);
        }

        self.store.enable_totp(user_id).await?;
        tracing::info!(user_id = %user_id, "totp enabled");
        Ok(())
    }

    fn issue(&self, user: User) -> Result<IssuedToken, ServiceError> {
        let (access_token, _) = self
            .tokens
            .issue_access_token(user.user_id, &user.email, user.token_version)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!(e)))?;

        Ok(IssuedToken {
            access_token,
            expires_in: self.tokens.access_expiry_seconds(),
            user,
        })
    }
}
