//! Team and membership models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Team member role codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Member,
    Viewer,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
            MemberRole::Viewer => "viewer",
        }
    }
}

/// Membership status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Pending,
    Active,
    Inactive,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Pending => "pending",
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
        }
    }
}

/// Team entity. Every user owns exactly one personal team, created during
/// registration; personal teams cannot be deleted.
#[derive(Debug, Clone, FromRow)]
pub struct Team {
    pub team_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub personal_team: bool,
    pub archived: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Team {
    pub fn new(owner_id: Uuid, name: String, description: Option<String>, personal: bool) -> Self {
        let now = Utc::now();
        Self {
            team_id: Uuid::new_v4(),
            owner_id,
            name,
            description,
            personal_team: personal,
            archived: false,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// The personal team created for a new user at registration.
    pub fn personal_for(owner_id: Uuid, owner_name: &str) -> Self {
        Self::new(owner_id, format!("{}'s Team", owner_name), None, true)
    }
}

/// Membership record linking a user to a team. Unique per (team, user).
#[derive(Debug, Clone, FromRow)]
pub struct TeamMember {
    pub member_id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role_code: String,
    pub status_code: String,
    pub invited_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl TeamMember {
    pub fn new(team_id: Uuid, user_id: Uuid, role: MemberRole, invited_by: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            member_id: Uuid::new_v4(),
            team_id,
            user_id,
            role_code: role.as_str().to_string(),
            status_code: MemberStatus::Active.as_str().to_string(),
            invited_by,
            created_utc: now,
            updated_utc: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status_code == MemberStatus::Active.as_str()
    }
}
