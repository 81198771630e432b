//! Persistence seam for the auth domain.
//!
//! Handlers and services only see this trait; production wires the Postgres
//! implementation and tests swap in the in-memory store.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{MemberRole, MemberStatus, PasswordReset, Team, TeamMember, User};

use super::error::ServiceError;

#[async_trait]
pub trait AuthStore: Send + Sync {
    // -- users --

    /// Insert the user together with their personal team and the admin
    /// membership, atomically. Fails with `EmailAlreadyRegistered` when the
    /// email is taken.
    async fn create_user_with_personal_team(
        &self,
        user: &User,
        team: &Team,
        member: &TeamMember,
    ) -> Result<(), ServiceError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError>;

    /// Atomically increment the user's token version, returning the new
    /// value. Concurrent bumps must each observe a distinct version.
    async fn bump_token_version(&self, user_id: Uuid) -> Result<i32, ServiceError>;

    /// Replace the password hash and bump the token version in one step.
    async fn update_password_and_bump_version(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<i32, ServiceError>;

    async fn set_totp_secret(&self, user_id: Uuid, secret: &str) -> Result<(), ServiceError>;

    async fn enable_totp(&self, user_id: Uuid) -> Result<(), ServiceError>;

    async fn set_current_team(&self, user_id: Uuid, team_id: Uuid) -> Result<(), ServiceError>;

    // -- password resets --

    async fn create_reset(&self, reset: &PasswordReset) -> Result<(), ServiceError>;

    /// Most recent reset for this email still in the `requested` state.
    async fn find_requested_reset(
        &self,
        email: &str,
    ) -> Result<Option<PasswordReset>, ServiceError>;

    async fn increment_reset_attempts(&self, reset_id: Uuid) -> Result<i32, ServiceError>;

    /// Compare-and-set `requested` to `otp_verified`, recording the reset
    /// session jti. Returns false when the record was not in `requested`.
    async fn mark_otp_verified(
        &self,
        reset_id: Uuid,
        reset_jti: Uuid,
    ) -> Result<bool, ServiceError>;

    /// Compare-and-set `otp_verified` to `completed`, matching the stored
    /// jti, and in the same atomic step replace the user's password hash
    /// and bump their token version. Returns the record when the transition
    /// won, None otherwise; a losing transition leaves the user untouched.
    async fn complete_reset(
        &self,
        reset_id: Uuid,
        expected_jti: Uuid,
        password_hash: &str,
    ) -> Result<Option<PasswordReset>, ServiceError>;

    // -- teams --

    async fn create_team(&self, team: &Team, admin: &TeamMember) -> Result<(), ServiceError>;

    async fn find_team(&self, team_id: Uuid) -> Result<Option<Team>, ServiceError>;

    async fn list_teams_for_user(&self, user_id: Uuid) -> Result<Vec<Team>, ServiceError>;

    async fn update_team(
        &self,
        team_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Team>, ServiceError>;

    /// Delete a non-personal team and its memberships. Returns false when
    /// the team does not exist.
    async fn delete_team(&self, team_id: Uuid) -> Result<bool, ServiceError>;

    async fn add_member(&self, member: &TeamMember) -> Result<(), ServiceError>;

    async fn find_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>, ServiceError>;

    async fn list_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, ServiceError>;

    async fn update_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: Option<MemberRole>,
        status: Option<MemberStatus>,
    ) -> Result<Option<TeamMember>, ServiceError>;

    async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> Result<bool, ServiceError>;
}
