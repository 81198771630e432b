pub mod password_reset;
pub mod team;
pub mod user;

pub use password_reset::{PasswordReset, ResetState};
pub use team::{MemberRole, MemberStatus, Team, TeamMember};
pub use user::{User, UserResponse};
