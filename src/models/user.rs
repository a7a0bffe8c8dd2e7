// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique wallet address (`0x` followed by 40 hex digits).
    pub address: String,

    /// Random public identifier below 1,000,000, unique per user.
    pub uid: i64,

    /// Forum admins can ban/unban comments and read banned content.
    pub is_forum_admin: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Author info embedded in comment and proposal payloads.
#[derive(Debug, Clone, Serialize)]
pub struct Author {
    pub id: i64,
    pub address: String,
}

/// DTO for creating a new user.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(custom(function = validate_address))]
    pub address: String,

    #[serde(default)]
    pub is_forum_admin: bool,
}

/// Validates that a string is a `0x`-prefixed, 20-byte hex address.
pub fn validate_address(address: &str) -> Result<(), validator::ValidationError> {
    let valid = address
        .strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()));

    if !valid {
        return Err(validator::ValidationError::new("invalid_address"));
    }
    Ok(())
}
