pub mod auth;
pub mod database;
pub mod email;
pub mod error;
pub mod memory;
pub mod rate_limit;
pub mod redis;
pub mod store;
pub mod team;
pub mod token;
pub mod totp;

pub use auth::{AuthService, IssuedToken, ResetSession};
pub use database::Database;
pub use email::{EmailProvider, MockEmailService, SmtpEmailService};
pub use error::ServiceError;
pub use memory::MemoryStore;
pub use rate_limit::{Action, RateLimiter};
pub use redis::{CounterStore, MemoryCache, RedisService, TokenDenyList};
pub use store::AuthStore;
pub use team::TeamService;
pub use token::{AccessClaims, ResetClaims, TokenService};
pub use totp::TotpService;
