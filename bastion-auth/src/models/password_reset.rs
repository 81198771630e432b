//! Password reset session - the three-phase OTP exchange.
//!
//! Each session carries an explicit tagged state and may only move forward:
//! `requested -> otp_verified -> completed`. Stores must apply transitions
//! with compare-and-set semantics so a concurrent verify or confirm can win
//! at most once.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Reset session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetState {
    Requested,
    OtpVerified,
    Completed,
}

impl ResetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetState::Requested => "requested",
            ResetState::OtpVerified => "otp_verified",
            ResetState::Completed => "completed",
        }
    }

    /// Whether `next` is the single legal successor of `self`.
    pub fn can_advance_to(&self, next: ResetState) -> bool {
        matches!(
            (self, next),
            (ResetState::Requested, ResetState::OtpVerified)
                | (ResetState::OtpVerified, ResetState::Completed)
        )
    }
}

/// Password reset session entity.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordReset {
    pub reset_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub otp_hash: String,
    pub otp_expires_utc: DateTime<Utc>,
    pub state_code: String,
    /// Snapshot of the user's 2FA flag when the reset was started.
    pub require_totp: bool,
    /// jti of the reset-session token issued at verify; consumed exactly once.
    pub reset_jti: Option<Uuid>,
    pub attempts: i32,
    pub consumed_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
}

impl PasswordReset {
    /// Open a new session in `requested` state with the given OTP hash.
    pub fn new(
        user_id: Uuid,
        email: String,
        otp_hash: String,
        otp_ttl_minutes: i64,
        require_totp: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            reset_id: Uuid::new_v4(),
            user_id,
            email,
            otp_hash,
            otp_expires_utc: now + Duration::minutes(otp_ttl_minutes),
            state_code: ResetState::Requested.as_str().to_string(),
            require_totp,
            reset_jti: None,
            attempts: 0,
            consumed_utc: None,
            created_utc: now,
        }
    }

    pub fn state(&self) -> Option<ResetState> {
        match self.state_code.as_str() {
            "requested" => Some(ResetState::Requested),
            "otp_verified" => Some(ResetState::OtpVerified),
            "completed" => Some(ResetState::Completed),
            _ => None,
        }
    }

    /// An OTP may still be presented: session is in `requested` state and
    /// the code has not expired.
    pub fn otp_usable(&self) -> bool {
        self.state_code == ResetState::Requested.as_str() && Utc::now() < self.otp_expires_utc
    }
}
