use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    forum::{
        Forum,
        query::{SortOrder, ThreadCriteria},
    },
    handlers::{current_user, current_viewer},
    models::comment::{CreateCommentRequest, ThreadParams},
    utils::jwt::{Claims, MaybeClaims},
};

/// Reply to a comment (or to a proposal's ROOT comment).
pub async fn create_reply(
    State(forum): State<Forum>,
    Extension(claims): Extension<Claims>,
    Path(parent_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&forum, &claims).await?;

    let comment = forum.comment(&user, parent_id, &payload.body).await?;
    let view = forum.comment_view(comment.id, Some(&user)).await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// Load more: the paginated thread below a comment.
/// Stage defaults to the comment's own stage.
pub async fn list_replies(
    State(forum): State<Forum>,
    Extension(claims): Extension<MaybeClaims>,
    Path(comment_id): Path<i64>,
    Query(params): Query<ThreadParams>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = current_viewer(&forum, &claims).await?;
    let comment = forum.find_comment(comment_id).await?;

    let criteria = ThreadCriteria {
        last_seen_id: params.last_seen_id,
        sort: SortOrder::from_param(params.sort_by.as_deref()),
    };
    let stage = params.stage.unwrap_or(comment.stage);

    let page = forum.thread(comment.id, viewer.as_ref(), stage, criteria).await?;

    Ok(Json(page))
}

/// Delete a comment (Soft Delete). Author only.
pub async fn delete_comment(
    State(forum): State<Forum>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&forum, &claims).await?;

    forum.delete(&user, comment_id).await?;

    Ok(Json(forum.comment_view(comment_id, Some(&user)).await?))
}

pub async fn like_comment(
    State(forum): State<Forum>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&forum, &claims).await?;

    forum.like(&user, comment_id).await?;

    Ok(Json(forum.comment_view(comment_id, Some(&user)).await?))
}

pub async fn unlike_comment(
    State(forum): State<Forum>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&forum, &claims).await?;

    forum.unlike(&user, comment_id).await?;

    Ok(Json(forum.comment_view(comment_id, Some(&user)).await?))
}

/// Ban a comment. Forum admin only; the engine re-checks the stored role.
pub async fn ban_comment(
    State(forum): State<Forum>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&forum, &claims).await?;

    forum.ban(&user, comment_id).await?;

    Ok(Json(forum.comment_view(comment_id, Some(&user)).await?))
}

pub async fn unban_comment(
    State(forum): State<Forum>,
    Extension(claims): Extension<Claims>,
    Path(comment_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&forum, &claims).await?;

    forum.unban(&user, comment_id).await?;

    Ok(Json(forum.comment_view(comment_id, Some(&user)).await?))
}
