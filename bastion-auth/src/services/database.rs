//! Postgres-backed store.
//!
//! Revocation bumps and reset-state transitions are single statements so
//! concurrent callers serialize on the row; the CAS updates filter on the
//! expected state and report whether they won via RETURNING.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{MemberRole, MemberStatus, PasswordReset, ResetState, Team, TeamMember, User};

use super::error::ServiceError;
use super::store::AuthStore;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}

#[async_trait]
impl AuthStore for Database {
    async fn create_user_with_personal_team(
        &self,
        user: &User,
        team: &Team,
        member: &TeamMember,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        let insert_user = sqlx::query(
            r#"
            INSERT INTO users
                (user_id, email, name, password_hash, token_version,
                 totp_secret, totp_enabled, current_team_id, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.token_version)
        .bind(&user.totp_secret)
        .bind(user.totp_enabled)
        .bind(team.team_id)
        .bind(user.created_utc)
        .bind(user.updated_utc)
        .execute(&mut *tx)
        .await;

        if let Err(e) = insert_user {
            return if is_unique_violation(&e) {
                Err(ServiceError::EmailAlreadyRegistered)
            } else {
                Err(e.into())
            };
        }

        sqlx::query(
            r#"
            INSERT INTO teams
                (team_id, owner_id, name, description, personal_team,
                 archived, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(team.team_id)
        .bind(team.owner_id)
        .bind(&team.name)
        .bind(&team.description)
        .bind(team.personal_team)
        .bind(team.archived)
        .bind(team.created_utc)
        .bind(team.updated_utc)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO team_members
                (member_id, team_id, user_id, role_code, status_code,
                 invited_by, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(member.member_id)
        .bind(member.team_id)
        .bind(member.user_id)
        .bind(&member.role_code)
        .bind(&member.status_code)
        .bind(member.invited_by)
        .bind(member.created_utc)
        .bind(member.updated_utc)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn bump_token_version(&self, user_id: Uuid) -> Result<i32, ServiceError> {
        let row: (i32,) = sqlx::query_as(
            r#"
            UPDATE users
            SET token_version = token_version + 1, updated_utc = NOW()
            WHERE user_id = $1
            RETURNING token_version
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::UserNotFound)?;

        Ok(row.0)
    }

    async fn update_password_and_bump_version(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<i32, ServiceError> {
        let row: (i32,) = sqlx::query_as(
            r#"
            UPDATE users
            SET password_hash = $2, token_version = token_version + 1, updated_utc = NOW()
            WHERE user_id = $1
            RETURNING token_version
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::UserNotFound)?;

        Ok(row.0)
    }

    async fn set_totp_secret(&self, user_id: Uuid, secret: &str) -> Result<(), ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET totp_secret = $2, totp_enabled = FALSE, updated_utc = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(secret)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::UserNotFound);
        }
        Ok(())
    }

    async fn enable_totp(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET totp_enabled = TRUE, updated_utc = NOW()
            WHERE user_id = $1 AND totp_secret IS NOT NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::TotpNotEnrolled);
        }
        Ok(())
    }

    async fn set_current_team(&self, user_id: Uuid, team_id: Uuid) -> Result<(), ServiceError> {
        let result = sqlx::query(
            "UPDATE users SET current_team_id = $2, updated_utc = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(team_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::UserNotFound);
        }
        Ok(())
    }

    async fn create_reset(&self, reset: &PasswordReset) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO password_resets
                (reset_id, user_id, email, otp_hash, otp_expires_utc, state_code,
                 require_totp, reset_jti, attempts, consumed_utc, created_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(reset.reset_id)
        .bind(reset.user_id)
        .bind(&reset.email)
        .bind(&reset.otp_hash)
        .bind(reset.otp_expires_utc)
        .bind(&reset.state_code)
        .bind(reset.require_totp)
        .bind(reset.reset_jti)
        .bind(reset.attempts)
        .bind(reset.consumed_utc)
        .bind(reset.created_utc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_requested_reset(
        &self,
        email: &str,
    ) -> Result<Option<PasswordReset>, ServiceError> {
        let reset = sqlx::query_as::<_, PasswordReset>(
            r#"
            SELECT * FROM password_resets
            WHERE email = $1 AND state_code = $2
            ORDER BY created_utc DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(ResetState::Requested.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(reset)
    }

    async fn increment_reset_attempts(&self, reset_id: Uuid) -> Result<i32, ServiceError> {
        let row: (i32,) = sqlx::query_as(
            r#"
            UPDATE password_resets
            SET attempts = attempts + 1
            WHERE reset_id = $1
            RETURNING attempts
            "#,
        )
        .bind(reset_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServiceError::InvalidOrExpiredOtp)?;

        Ok(row.0)
    }

    async fn mark_otp_verified(
        &self,
        reset_id: Uuid,
        reset_jti: Uuid,
    ) -> Result<bool, ServiceError> {
        let result = sqlx::query(
            r#"
            UPDATE password_resets
            SET state_code = $3, reset_jti = $4
            WHERE reset_id = $1 AND state_code = $2
            "#,
        )
        .bind(reset_id)
        .bind(ResetState::Requested.as_str())
        .bind(ResetState::OtpVerified.as_str())
        .bind(reset_jti)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete_reset(
        &self,
        reset_id: Uuid,
        expected_jti: Uuid,
        password_hash: &str,
    ) -> Result<Option<PasswordReset>, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let reset = sqlx::query_as::<_, PasswordReset>(
            r#"
            UPDATE password_resets
            SET state_code = $4, consumed_utc = NOW()
            WHERE reset_id = $1 AND state_code = $2 AND reset_jti = $3
            RETURNING *
            "#,
        )
        .bind(reset_id)
        .bind(ResetState::OtpVerified.as_str())
        .bind(expected_jti)
        .bind(ResetState::Completed.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(reset) = reset else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, token_version = token_version + 1, updated_utc = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(reset.user_id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(reset))
    }

    async fn create_team(&self, team: &Team, admin: &TeamMember) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO teams
                (team_id, owner_id, name, description, personal_team,
                 archived, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(team.team_id)
        .bind(team.owner_id)
        .bind(&team.name)
        .bind(&team.description)
        .bind(team.personal_team)
        .bind(team.archived)
        .bind(team.created_utc)
        .bind(team.updated_utc)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO team_members
                (member_id, team_id, user_id, role_code, status_code,
                 invited_by, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(admin.member_id)
        .bind(admin.team_id)
        .bind(admin.user_id)
        .bind(&admin.role_code)
        .bind(&admin.status_code)
        .bind(admin.invited_by)
        .bind(admin.created_utc)
        .bind(admin.updated_utc)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_team(&self, team_id: Uuid) -> Result<Option<Team>, ServiceError> {
        let team = sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE team_id = $1")
            .bind(team_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(team)
    }

    async fn list_teams_for_user(&self, user_id: Uuid) -> Result<Vec<Team>, ServiceError> {
        let teams = sqlx::query_as::<_, Team>(
            r#"
            SELECT t.* FROM teams t
            JOIN team_members m ON m.team_id = t.team_id
            WHERE m.user_id = $1 AND m.status_code = $2
            ORDER BY t.created_utc
            "#,
        )
        .bind(user_id)
        .bind(MemberStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(teams)
    }

    async fn update_team(
        &self,
        team_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Team>, ServiceError> {
        let team = sqlx::query_as::<_, Team>(
            r#"
            UPDATE teams
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_utc = NOW()
            WHERE team_id = $1
            RETURNING *
            "#,
        )
        .bind(team_id)
        .bind(name)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?;
        Ok(team)
    }

    async fn delete_team(&self, team_id: Uuid) -> Result<bool, ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM team_members WHERE team_id = $1")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM teams WHERE team_id = $1")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    async fn add_member(&self, member: &TeamMember) -> Result<(), ServiceError> {
        sqlx::query(
            r#"
            INSERT INTO team_members
                (member_id, team_id, user_id, role_code, status_code,
                 invited_by, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(member.member_id)
        .bind(member.team_id)
        .bind(member.user_id)
        .bind(&member.role_code)
        .bind(&member.status_code)
        .bind(member.invited_by)
        .bind(member.created_utc)
        .bind(member.updated_utc)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Internal(anyhow::anyhow!("Already a member of this team"))
            } else {
                ServiceError::Database(e)
            }
        })?;
        Ok(())
    }

    async fn find_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>, ServiceError> {
        let member = sqlx::query_as::<_, TeamMember>(
            "SELECT * FROM team_members WHERE team_id = $1 AND user_id = $2",
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn list_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, ServiceError> {
        let members = sqlx::query_as::<_, TeamMember>(
            "SELECT * FROM team_members WHERE team_id = $1 ORDER BY created_utc",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    async fn update_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: Option<MemberRole>,
        status: Option<MemberStatus>,
    ) -> Result<Option<TeamMember>, ServiceError> {
        let member = sqlx::query_as::<_, TeamMember>(
            r#"
            UPDATE team_members
            SET role_code = COALESCE($3, role_code),
                status_code = COALESCE($4, status_code),
                updated_utc = NOW()
            WHERE team_id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .bind(role.map(|r| r.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> Result<bool, ServiceError> {
        let result =
            sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND user_id = $2")
                .bind(team_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }
}
