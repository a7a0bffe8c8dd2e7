// src/handlers/mod.rs

pub mod comment;
pub mod proposal;
pub mod user;

use crate::{
    error::AppError,
    forum::Forum,
    models::user::User,
    utils::jwt::{Claims, MaybeClaims},
};

/// Loads the stored user behind an authenticated request.
pub(crate) async fn current_user(forum: &Forum, claims: &Claims) -> Result<User, AppError> {
    forum
        .find_user(claims.user_id()?)
        .await?
        .ok_or(AppError::AuthError("User no longer exists".to_string()))
}

/// Loads the viewer of a read request, if any.
pub(crate) async fn current_viewer(forum: &Forum, claims: &MaybeClaims) -> Result<Option<User>, AppError> {
    match &claims.0 {
        Some(claims) => current_user(forum, claims).await.map(Some),
        None => Ok(None),
    }
}
