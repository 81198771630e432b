//! Team management: CRUD, membership and the current-team switch.
//!
//! Authorization is membership-based. Mutations require the admin role;
//! reads require active membership of any role.

use std::sync::Arc;
use uuid::Uuid;

use crate::models::{MemberRole, MemberStatus, Team, TeamMember};

use super::error::ServiceError;
use super::store::AuthStore;

pub struct TeamService {
    store: Arc<dyn AuthStore>,
}

impl TeamService {
    pub fn new(store: Arc<dyn AuthStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        owner_id: Uuid,
        name: String,
        description: Option<String>,
    ) -> Result<Team, ServiceError> {
        let team = Team::new(owner_id, name, description, false);
        let admin = TeamMember::new(team.team_id, owner_id, MemberRole::Admin, None);

        self.store.create_team(&team, &admin).await?;
        tracing::info!(team_id = %team.team_id, owner_id = %owner_id, "team created");
        Ok(team)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Team>, ServiceError> {
        self.store.list_teams_for_user(user_id).await
    }

    pub async fn get(&self, team_id: Uuid, user_id: Uuid) -> Result<Team, ServiceError> {
        self.require_member(team_id, user_id).await?;
        self.store
            .find_team(team_id)
            .await?
            .ok_or(ServiceError::TeamNotFound)
    }

    pub async fn update(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Team, ServiceError> {
        self.require_admin(team_id, user_id).await?;
        self.store
            .update_team(team_id, name, description)
            .await?
            .ok_or(ServiceError::TeamNotFound)
    }

    pub async fn delete(&self, team_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        self.require_admin(team_id, user_id).await?;

        let team = self
            .store
            .find_team(team_id)
            .await?
            .ok_or(ServiceError::TeamNotFound)?;
        if team.personal_team {
            return Err(ServiceError::PersonalTeamImmutable);
        }

        if !self.store.delete_team(team_id).await? {
            return Err(ServiceError::TeamNotFound);
        }
        tracing::info!(team_id = %team_id, "team deleted");
        Ok(())
    }

    pub async fn add_member(
        &self,
        team_id: Uuid,
        acting_user: Uuid,
        email: &str,
        role: MemberRole,
    ) -> Result<TeamMember, ServiceError> {
        self.require_admin(team_id, acting_user).await?;

        let user = self
            .store
            .find_user_by_email(&email.to_lowercase())
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let member = TeamMember::new(team_id, user.user_id, role, Some(acting_user));
        self.store.add_member(&member).await?;
        tracing::info!(team_id = %team_id, user_id = %user.user_id, "member added");
        Ok(member)
    }

    pub async fn list_members(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<TeamMember>, ServiceError> {
        self.require_member(team_id, user_id).await?;
        self.store.list_members(team_id).await
    }

    pub async fn update_member(
        &self,
        team_id: Uuid,
        acting_user: Uuid,
        target_user: Uuid,
        role: Option<MemberRole>,
        status: Option<MemberStatus>,
    ) -> Result<TeamMember, ServiceError> {
        self.require_admin(team_id, acting_user).await?;
        self.store
            .update_member(team_id, target_user, role, status)
            .await?
            .ok_or(ServiceError::NotAMember)
    }

    pub async fn remove_member(
        &self,
        team_id: Uuid,
        acting_user: Uuid,
        target_user: Uuid,
    ) -> Result<(), ServiceError> {
        // Members may leave on their own; removing anyone else takes admin.
        if acting_user != target_user {
            self.require_admin(team_id, acting_user).await?;
        } else {
            self.require_member(team_id, acting_user).await?;
        }

        let team = self
            .store
            .find_team(team_id)
            .await?
            .ok_or(ServiceError::TeamNotFound)?;
        if team.personal_team && target_user == team.owner_id {
            return Err(ServiceError::PersonalTeamImmutable);
        }

        if !self.store.remove_member(team_id, target_user).await? {
            return Err(ServiceError::NotAMember);
        }
        tracing::info!(team_id = %team_id, user_id = %target_user, "member removed");
        Ok(())
    }

    /// Point the user's current-team marker at a team they belong to.
    pub async fn switch_current(&self, user_id: Uuid, team_id: Uuid) -> Result<(), ServiceError> {
        self.require_member(team_id, user_id).await?;
        self.store.set_current_team(user_id, team_id).await?;
        tracing::info!(user_id = %user_id, team_id = %team_id, "current team switched");
        Ok(())
    }

    async fn require_member(&self, team_id: Uuid, user_id: Uuid) -> Result<TeamMember, ServiceError> {
        let member = self
            .store
            .find_member(team_id, user_id)
            .await?
            .ok_or(ServiceError::NotAMember)?;
        if !member.is_active() {
            return Err(ServiceError::NotAMember);
        }
        Ok(member)
    }

    async fn require_admin(&self, team_id: Uuid, user_id: Uuid) -> Result<TeamMember, ServiceError> {
        let member = self.require_member(team_id, user_id).await?;
        if member.role_code != MemberRole::Admin.as_str() {
            return Err(ServiceError::InsufficientRole);
        }
        Ok(member)
    }
}
