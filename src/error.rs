// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::forum::closure::ClosureError;

/// Tagged outcome of every forum operation that can fail.
///
/// Each variant maps to one symbolic result tag (see [`ActionError::tag`]);
/// callers get either the updated entity or one of these, never a panic.
#[derive(Debug)]
pub enum ActionError {
    /// Local validation failed (body too long, unknown proposer, ...).
    InvalidData(String),

    /// The store rejected a structurally valid write, or the transaction failed.
    DatabaseError(String),

    /// The authorization policy denied the action.
    UnauthorizedAction,

    NotFound(String),
    AlreadyLiked,
    NotLiked,
    AlreadyDeleted,
    CommentAlreadyBanned,
    CommentAlreadyUnbanned,
    MaximumCommentDepth,

    /// The comment's tree root is not owned by any proposal.
    CommentNotLinked,
}

impl ActionError {
    pub fn tag(&self) -> &'static str {
        match self {
            ActionError::InvalidData(_) => "invalid_data",
            ActionError::DatabaseError(_) => "database_error",
            ActionError::UnauthorizedAction => "unauthorized_action",
            ActionError::NotFound(_) => "not_found",
            ActionError::AlreadyLiked => "already_liked",
            ActionError::NotLiked => "not_liked",
            ActionError::AlreadyDeleted => "already_deleted",
            ActionError::CommentAlreadyBanned => "comment_already_banned",
            ActionError::CommentAlreadyUnbanned => "comment_already_unbanned",
            ActionError::MaximumCommentDepth => "maximum_comment_depth",
            ActionError::CommentNotLinked => "comment_not_linked",
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            ActionError::InvalidData(msg)
            | ActionError::DatabaseError(msg)
            | ActionError::NotFound(msg) => Some(msg),
            _ => None,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ActionError::InvalidData(_) => StatusCode::BAD_REQUEST,
            ActionError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ActionError::UnauthorizedAction => StatusCode::FORBIDDEN,
            ActionError::NotFound(_) => StatusCode::NOT_FOUND,
            ActionError::MaximumCommentDepth | ActionError::CommentNotLinked => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ActionError::AlreadyLiked
            | ActionError::NotLiked
            | ActionError::AlreadyDeleted
            | ActionError::CommentAlreadyBanned
            | ActionError::CommentAlreadyUnbanned => StatusCode::CONFLICT,
        }
    }

    /// Maps a unique-constraint violation to `conflict`, anything else to a
    /// database error. Used where a concurrent duplicate insert has a
    /// dedicated tag (e.g. two simultaneous likes from one user).
    pub fn on_unique_violation(err: sqlx::Error, conflict: ActionError) -> ActionError {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return conflict;
            }
        }
        ActionError::from(err)
    }
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {}", self.tag(), detail),
            None => f.write_str(self.tag()),
        }
    }
}

impl std::error::Error for ActionError {}

impl From<sqlx::Error> for ActionError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Forum database error: {:?}", err);
        ActionError::DatabaseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ActionError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ActionError::InvalidData(errors.to_string())
    }
}

impl From<ClosureError> for ActionError {
    fn from(err: ClosureError) -> Self {
        match err {
            ClosureError::Database(e) => ActionError::from(e),
            other => ActionError::DatabaseError(other.to_string()),
        }
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Forum action failed: {}", self);
        }
        let body = Json(json!({
            "error": self.tag(),
            "detail": self.detail(),
        }));

        (status, body).into_response()
    }
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // Tagged forum outcome, rendered with its own status and tag.
    Action(ActionError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Action(err) => return err.into_response(),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<ActionError> for AppError {
    fn from(err: ActionError) -> Self {
        AppError::Action(err)
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_result_names() {
        assert_eq!(ActionError::AlreadyLiked.tag(), "already_liked");
        assert_eq!(ActionError::MaximumCommentDepth.tag(), "maximum_comment_depth");
        assert_eq!(
            ActionError::InvalidData("body: too long".into()).to_string(),
            "invalid_data: body: too long"
        );
    }

    #[test]
    fn conflicts_render_as_409() {
        let response = AppError::from(ActionError::CommentAlreadyBanned).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = ActionError::UnauthorizedAction.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
