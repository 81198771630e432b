//! In-memory store for integration tests.
//!
//! Mirrors the Postgres CAS semantics with a single mutex so the state
//! machine tests exercise the same transition rules without a database.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{MemberRole, MemberStatus, PasswordReset, ResetState, Team, TeamMember, User};

use super::error::ServiceError;
use super::store::AuthStore;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    teams: HashMap<Uuid, Team>,
    members: Vec<TeamMember>,
    resets: HashMap<Uuid, PasswordReset>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn create_user_with_personal_team(
        &self,
        user: &User,
        team: &Team,
        member: &TeamMember,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();

        if state.users.values().any(|u| u.email == user.email) {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let mut user = user.clone();
        user.current_team_id = Some(team.team_id);
        state.users.insert(user.user_id, user);
        state.teams.insert(team.team_id, team.clone());
        state.members.push(member.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state.users.get(&user_id).cloned())
    }

    async fn bump_token_version(&self, user_id: Uuid) -> Result<i32, ServiceError> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(ServiceError::UserNotFound)?;
        user.token_version += 1;
        Ok(user.token_version)
    }

    async fn update_password_and_bump_version(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<i32, ServiceError> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(ServiceError::UserNotFound)?;
        user.password_hash = password_hash.to_string();
        user.token_version += 1;
        Ok(user.token_version)
    }

    async fn set_totp_secret(&self, user_id: Uuid, secret: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(ServiceError::UserNotFound)?;
        user.totp_secret = Some(secret.to_string());
        user.totp_enabled = false;
        Ok(())
    }

    async fn enable_totp(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(ServiceError::UserNotFound)?;
        if user.totp_secret.is_none() {
            return Err(ServiceError::TotpNotEnrolled);
        }
        user.totp_enabled = true;
        Ok(())
    }

    async fn set_current_team(&self, user_id: Uuid, team_id: Uuid) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(ServiceError::UserNotFound)?;
        user.current_team_id = Some(team_id);
        Ok(())
    }

    async fn create_reset(&self, reset: &PasswordReset) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.resets.insert(reset.reset_id, reset.clone());
        Ok(())
    }

    async fn find_requested_reset(
        &self,
        email: &str,
    ) -> Result<Option<PasswordReset>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .resets
            .values()
            .filter(|r| r.email == email && r.state_code == ResetState::Requested.as_str())
            .max_by_key(|r| r.created_utc)
            .cloned())
    }

    async fn increment_reset_attempts(&self, reset_id: Uuid) -> Result<i32, ServiceError> {
        let mut state = self.state.lock().unwrap();
        let reset = state
            .resets
            .get_mut(&reset_id)
            .ok_or(ServiceError::InvalidOrExpiredOtp)?;
        reset.attempts += 1;
        Ok(reset.attempts)
    }

    async fn mark_otp_verified(
        &self,
        reset_id: Uuid,
        reset_jti: Uuid,
    ) -> Result<bool, ServiceError> {
        let mut state = self.state.lock().unwrap();
        match state.resets.get_mut(&reset_id) {
            Some(reset)
                if reset
                    .state()
                    .is_some_and(|s| s.can_advance_to(ResetState::OtpVerified)) =>
            {
                reset.state_code = ResetState::OtpVerified.as_str().to_string();
                reset.reset_jti = Some(reset_jti);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_reset(
        &self,
        reset_id: Uuid,
        expected_jti: Uuid,
        password_hash: &str,
    ) -> Result<Option<PasswordReset>, ServiceError> {
        // One lock scope covers the CAS and the password/version update, so
        // a losing transition changes nothing.
        let mut state = self.state.lock().unwrap();

        let consumed = match state.resets.get_mut(&reset_id) {
            Some(reset)
                if reset
                    .state()
                    .is_some_and(|s| s.can_advance_to(ResetState::Completed))
                    && reset.reset_jti == Some(expected_jti) =>
            {
                reset.state_code = ResetState::Completed.as_str().to_string();
                reset.consumed_utc = Some(chrono::Utc::now());
                reset.clone()
            }
            _ => return Ok(None),
        };

        if let Some(user) = state.users.get_mut(&consumed.user_id) {
            user.password_hash = password_hash.to_string();
            user.token_version += 1;
        }

        Ok(Some(consumed))
    }

    async fn create_team(&self, team: &Team, admin: &TeamMember) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.teams.insert(team.team_id, team.clone());
        state.members.push(admin.clone());
        Ok(())
    }

    async fn find_team(&self, team_id: Uuid) -> Result<Option<Team>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state.teams.get(&team_id).cloned())
    }

    async fn list_teams_for_user(&self, user_id: Uuid) -> Result<Vec<Team>, ServiceError> {
        let state = self.state.lock().unwrap();
        let mut teams: Vec<Team> = state
            .members
            .iter()
            .filter(|m| m.user_id == user_id && m.is_active())
            .filter_map(|m| state.teams.get(&m.team_id).cloned())
            .collect();
        teams.sort_by_key(|t| t.created_utc);
        Ok(teams)
    }

    async fn update_team(
        &self,
        team_id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Team>, ServiceError> {
        let mut state = self.state.lock().unwrap();
        match state.teams.get_mut(&team_id) {
            Some(team) => {
                if let Some(name) = name {
                    team.name = name.to_string();
                }
                if let Some(description) = description {
                    team.description = Some(description.to_string());
                }
                team.updated_utc = chrono::Utc::now();
                Ok(Some(team.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_team(&self, team_id: Uuid) -> Result<bool, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.members.retain(|m| m.team_id != team_id);
        Ok(state.teams.remove(&team_id).is_some())
    }

    async fn add_member(&self, member: &TeamMember) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        if state
            .members
            .iter()
            .any(|m| m.team_id == member.team_id && m.user_id == member.user_id)
        {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "Already a member of this team"
            )));
        }
        state.members.push(member.clone());
        Ok(())
    }

    async fn find_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .members
            .iter()
            .find(|m| m.team_id == team_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>, ServiceError> {
        let state = self.state.lock().unwrap();
        let mut members: Vec<TeamMember> = state
            .members
            .iter()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.created_utc);
        Ok(members)
    }

    async fn update_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: Option<MemberRole>,
        status: Option<MemberStatus>,
    ) -> Result<Option<TeamMember>, ServiceError> {
        let mut state = self.state.lock().unwrap();
        match state
            .members
            .iter_mut()
            .find(|m| m.team_id == team_id && m.user_id == user_id)
        {
            Some(member) => {
                if let Some(role) = role {
                    member.role_code = role.as_str().to_string();
                }
                if let Some(status) = status {
                    member.status_code = status.as_str().to_string();
                }
                member.updated_utc = chrono::Utc::now();
                Ok(Some(member.clone()))
            }
            None => Ok(None),
        }
    }

    async fn remove_member(&self, team_id: Uuid, user_id: Uuid) -> Result<bool, ServiceError> {
        let mut state = self.state.lock().unwrap();
        let before = state.members.len();
        state
            .members
            .retain(|m| !(m.team_id == team_id && m.user_id == user_id));
        Ok(state.members.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_store() -> (MemoryStore, User, PasswordReset) {
        let store = MemoryStore::new();
        let user = User::new("alice@example.com".into(), "old-hash".into(), None);
        let team = Team::personal_for(user.user_id, "Alice");
        let member = TeamMember::new(team.team_id, user.user_id, MemberRole::Admin, None);
        store
            .create_user_with_personal_team(&user, &team, &member)
            .await
            .unwrap();

        let reset =
            PasswordReset::new(user.user_id, user.email.clone(), "otp-hash".into(), 10, false);
        store.create_reset(&reset).await.unwrap();
        (store, user, reset)
    }

    #[tokio::test]
    async fn complete_reset_is_atomic_with_the_password_swap() {
        let (store, user, reset) = seeded_store().await;
        let jti = Uuid::new_v4();
        assert!(store.mark_otp_verified(reset.reset_id, jti).await.unwrap());

        // A losing CAS (wrong jti) leaves the account untouched.
        let lost = store
            .complete_reset(reset.reset_id, Uuid::new_v4(), "new-hash")
            .await
            .unwrap();
        assert!(lost.is_none());
        let untouched = store.find_user_by_id(user.user_id).await.unwrap().unwrap();
        assert_eq!(untouched.password_hash, "old-hash");
        assert_eq!(untouched.token_version, user.token_version);

        // The winning CAS swaps the password and bumps the version together.
        let won = store
            .complete_reset(reset.reset_id, jti, "new-hash")
            .await
            .unwrap();
        assert!(won.is_some());
        let updated = store.find_user_by_id(user.user_id).await.unwrap().unwrap();
        assert_eq!(updated.password_hash, "new-hash");
        assert_eq!(updated.token_version, user.token_version + 1);

        // And it only wins once.
        let replay = store
            .complete_reset(reset.reset_id, jti, "evil-hash")
            .await
            .unwrap();
        assert!(replay.is_none());
    }

    #[tokio::test]
    async fn otp_verification_only_advances_from_requested() {
        let (store, _user, reset) = seeded_store().await;
        assert!(store
            .mark_otp_verified(reset.reset_id, Uuid::new_v4())
            .await
            .unwrap());

        // Already past `requested`; a second verify loses.
        assert!(!store
            .mark_otp_verified(reset.reset_id, Uuid::new_v4())
            .await
            .unwrap());
    }
}
