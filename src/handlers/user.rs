use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::{ActionError, AppError},
    forum::Forum,
    handlers::current_user,
    models::user::CreateUserRequest,
    utils::jwt::Claims,
};

/// Details of the current user.
pub async fn details(
    State(forum): State<Forum>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&forum, &claims).await?;

    Ok(Json(user))
}

/// Creates a new user for a wallet address.
/// Forum admin only.
pub async fn create_user(
    State(forum): State<Forum>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let admin = current_user(&forum, &claims).await?;
    if !admin.is_forum_admin {
        return Err(AppError::Forbidden("Only forum admins can create users".to_string()));
    }

    let address = payload.address.clone();
    let user = forum.create_user(payload).await.map_err(|e| match e {
        ActionError::DatabaseError(msg) if msg.contains("UNIQUE") => {
            AppError::Conflict(format!("Address '{}' already exists", address))
        }
        other => AppError::from(other),
    })?;

    Ok((StatusCode::CREATED, Json(user)))
}
