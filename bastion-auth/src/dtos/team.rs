use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{MemberRole, MemberStatus, Team, TeamMember};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub role: MemberRole,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMemberRequest {
    pub role: Option<MemberRole>,
    pub status: Option<MemberStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeamResponse {
    pub team_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub personal_team: bool,
    pub archived: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<Team> for TeamResponse {
    fn from(team: Team) -> Self {
        Self {
            team_id: team.team_id,
            owner_id: team.owner_id,
            name: team.name,
            description: team.description,
            personal_team: team.personal_team,
            archived: team.archived,
            created_utc: team.created_utc,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeamMemberResponse {
    pub member_id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub status: String,
    pub created_utc: DateTime<Utc>,
}

impl From<TeamMember> for TeamMemberResponse {
    fn from(member: TeamMember) -> Self {
        Self {
            member_id: member.member_id,
            team_id: member.team_id,
            user_id: member.user_id,
            role: member.role_code,
            status: member.status_code,
            created_utc: member.created_utc,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TeamListResponse {
    pub teams: Vec<TeamResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemberListResponse {
    pub members: Vec<TeamMemberResponse>,
}
