use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::Role;

/// The decoded payload of a verified session token.
///
/// Attached to the request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the account id.
    pub sub: Uuid,
    pub role: Role,
    pub email: String,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiry (Unix seconds). Only present when a token lifetime is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl Claims {
    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }
}
