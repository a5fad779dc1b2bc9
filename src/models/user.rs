//! User model and authentication types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// User roles stored in `library_user.user_role`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[repr(i16)]
pub enum UserRole {
    Unknown = 0,
    Member = 1,
    Librarian = 2,
}

impl From<i64> for UserRole {
    fn from(v: i64) -> Self {
        match v {
            1 => UserRole::Member,
            2 => UserRole::Librarian,
            _ => UserRole::Unknown,
        }
    }
}

impl From<UserRole> for i64 {
    fn from(r: UserRole) -> Self {
        r as i64
    }
}

impl UserRole {
    pub fn require_librarian(&self) -> Result<(), AppError> {
        match self {
            UserRole::Librarian => Ok(()),
            _ => Err(AppError::Forbidden("Librarian role required".to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct LoginResponse {
    pub token: String,
}
