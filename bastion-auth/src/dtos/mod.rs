pub mod auth;
pub mod team;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use auth::*;
pub use team::*;

/// Standard error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Generic acknowledgement body for operations with no payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
