//! Team endpoints. All of them sit behind the auth middleware.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use bastion_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{
    AddMemberRequest, CreateTeamRequest, ErrorResponse, MemberListResponse, MessageResponse,
    TeamListResponse, TeamMemberResponse, TeamResponse, UpdateMemberRequest, UpdateTeamRequest,
};
use crate::middleware::AuthUser;
use crate::utils::ValidatedJson;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/teams",
    request_body = CreateTeamRequest,
    responses(
        (status = 201, description = "Team created", body = TeamResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "teams"
)]
pub async fn create_team(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<CreateTeamRequest>,
) -> Result<(StatusCode, Json<TeamResponse>), AppError> {
    let team = state
        .teams
        .create(auth_user.user.user_id, req.name, req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(team.into())))
}

#[utoipa::path(
    get,
    path = "/api/teams",
    responses(
        (status = 200, description = "Teams the user belongs to", body = TeamListResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "teams"
)]
pub async fn list_teams(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<TeamListResponse>, AppError> {
    let teams = state.teams.list_for_user(auth_user.user.user_id).await?;
    Ok(Json(TeamListResponse {
        teams: teams.into_iter().map(TeamResponse::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/teams/{team_id}",
    params(("team_id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Team", body = TeamResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
        (status = 404, description = "Team not found", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "teams"
)]
pub async fn get_team(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<TeamResponse>, AppError> {
    let team = state.teams.get(team_id, auth_user.user.user_id).await?;
    Ok(Json(team.into()))
}

#[utoipa::path(
    put,
    path = "/api/teams/{team_id}",
    params(("team_id" = Uuid, Path, description = "Team id")),
    request_body = UpdateTeamRequest,
    responses(
        (status = 200, description = "Team updated", body = TeamResponse),
        (status = 403, description = "Insufficient role", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "teams"
)]
pub async fn update_team(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateTeamRequest>,
) -> Result<Json<TeamResponse>, AppError> {
    let team = state
        .teams
        .update(
            team_id,
            auth_user.user.user_id,
            req.name.as_deref(),
            req.description.as_deref(),
        )
        .await?;
    Ok(Json(team.into()))
}

#[utoipa::path(
    delete,
    path = "/api/teams/{team_id}",
    params(("team_id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Team deleted", body = MessageResponse),
        (status = 400, description = "Personal teams cannot be deleted", body = ErrorResponse),
        (status = 403, description = "Insufficient role", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "teams"
)]
pub async fn delete_team(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.teams.delete(team_id, auth_user.user.user_id).await?;
    Ok(Json(MessageResponse {
        message: "Team deleted".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/teams/{team_id}/members",
    params(("team_id" = Uuid, Path, description = "Team id")),
    request_body = AddMemberRequest,
    responses(
        (status = 201, description = "Member added", body = TeamMemberResponse),
        (status = 403, description = "Insufficient role", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "teams"
)]
pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<AddMemberRequest>,
) -> Result<(StatusCode, Json<TeamMemberResponse>), AppError> {
    let member = state
        .teams
        .add_member(team_id, auth_user.user.user_id, &req.email, req.role)
        .await?;
    Ok((StatusCode::CREATED, Json(member.into())))
}

#[utoipa::path(
    get,
    path = "/api/teams/{team_id}/members",
    params(("team_id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Team members", body = MemberListResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "teams"
)]
pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<MemberListResponse>, AppError> {
    let members = state
        .teams
        .list_members(team_id, auth_user.user.user_id)
        .await?;
    Ok(Json(MemberListResponse {
        members: members.into_iter().map(TeamMemberResponse::from).collect(),
    }))
}

#[utoipa::path(
    put,
    path = "/api/teams/{team_id}/members/{user_id}",
    params(
        ("team_id" = Uuid, Path, description = "Team id"),
        ("user_id" = Uuid, Path, description = "Member user id"),
    ),
    request_body = UpdateMemberRequest,
    responses(
        (status = 200, description = "Member updated", body = TeamMemberResponse),
        (status = 403, description = "Insufficient role", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "teams"
)]
pub async fn update_member(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateMemberRequest>,
) -> Result<Json<TeamMemberResponse>, AppError> {
    let member = state
        .teams
        .update_member(
            team_id,
            auth_user.user.user_id,
            user_id,
            req.role,
            req.status,
        )
        .await?;
    Ok(Json(member.into()))
}

#[utoipa::path(
    delete,
    path = "/api/teams/{team_id}/members/{user_id}",
    params(
        ("team_id" = Uuid, Path, description = "Team id"),
        ("user_id" = Uuid, Path, description = "Member user id"),
    ),
    responses(
        (status = 200, description = "Member removed", body = MessageResponse),
        (status = 403, description = "Insufficient role", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "teams"
)]
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path((team_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .teams
        .remove_member(team_id, auth_user.user.user_id, user_id)
        .await?;
    Ok(Json(MessageResponse {
        message: "Member removed".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/teams/{team_id}/switch",
    params(("team_id" = Uuid, Path, description = "Team id")),
    responses(
        (status = 200, description = "Current team switched", body = MessageResponse),
        (status = 403, description = "Not a member", body = ErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "teams"
)]
pub async fn switch_team(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(team_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .teams
        .switch_current(auth_user.user.user_id, team_id)
        .await?;
    Ok(Json(MessageResponse {
        message: "Current team switched".to_string(),
    }))
}
