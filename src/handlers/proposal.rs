use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    forum::Forum,
    handlers::{current_user, current_viewer},
    models::{
        comment::ThreadParams,
        proposal::{CreateProposalRequest, ProposalListParams, UpdateStageRequest},
    },
    utils::jwt::{Claims, MaybeClaims},
};

/// Register a proposal. Forum admin only.
pub async fn create_proposal(
    State(forum): State<Forum>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateProposalRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = current_user(&forum, &claims).await?;
    if !user.is_forum_admin {
        return Err(AppError::Forbidden("Only forum admins can register proposals".to_string()));
    }

    let proposal = forum.create_proposal(payload).await?;
    let response = forum.find_proposal(&proposal.proposal_id, Some(&user)).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// List proposals, optionally filtered by stage and ids.
pub async fn list_proposals(
    State(forum): State<Forum>,
    Extension(claims): Extension<MaybeClaims>,
    Query(params): Query<ProposalListParams>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = current_viewer(&forum, &claims).await?;

    let proposals = forum.list_proposals(&params, viewer.as_ref()).await?;

    Ok(Json(proposals))
}

/// Get a single proposal by its external id.
pub async fn get_proposal(
    State(forum): State<Forum>,
    Extension(claims): Extension<MaybeClaims>,
    Path(proposal_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = current_viewer(&forum, &claims).await?;

    Ok(Json(forum.find_proposal(&proposal_id, viewer.as_ref()).await?))
}

pub async fn like_proposal(
    State(forum): State<Forum>,
    Extension(claims): Extension<Claims>,
    Path(proposal_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&forum, &claims).await?;

    forum.like_proposal(&user, &proposal_id).await?;

    Ok(Json(forum.find_proposal(&proposal_id, Some(&user)).await?))
}

pub async fn unlike_proposal(
    State(forum): State<Forum>,
    Extension(claims): Extension<Claims>,
    Path(proposal_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&forum, &claims).await?;

    forum.unlike_proposal(&user, &proposal_id).await?;

    Ok(Json(forum.find_proposal(&proposal_id, Some(&user)).await?))
}

/// Move a proposal to another stage. Forum admin only.
pub async fn update_stage(
    State(forum): State<Forum>,
    Extension(claims): Extension<Claims>,
    Path(proposal_id): Path<String>,
    Json(payload): Json<UpdateStageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = current_user(&forum, &claims).await?;

    forum
        .update_proposal_stage(&user, &proposal_id, payload.stage)
        .await?;

    Ok(Json(forum.find_proposal(&proposal_id, Some(&user)).await?))
}

/// Comment threads of a proposal.
pub async fn list_comments(
    State(forum): State<Forum>,
    Extension(claims): Extension<MaybeClaims>,
    Path(proposal_id): Path<String>,
    Query(params): Query<ThreadParams>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = current_viewer(&forum, &claims).await?;

    let page = forum
        .proposal_threads(&proposal_id, viewer.as_ref(), &params)
        .await?;

    Ok(Json(page))
}
