use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::{stage::Stage, user::validate_address};

/// Column list matching [`Proposal`].
pub const PROPOSAL_COLUMNS: &str = "id, proposal_id, user_id, comment_id, stage, likes, created_at";

/// Represents the 'proposals' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Proposal {
    pub id: i64,

    /// External identifier of the proposal.
    pub proposal_id: String,

    /// Proposer.
    pub user_id: i64,

    /// The `ROOT` comment every thread of this proposal hangs from.
    pub comment_id: i64,

    #[sqlx(try_from = "String")]
    pub stage: Stage,

    pub likes: i64,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Proposal joined with its proposer and the viewer's like state.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProposalResponse {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub proposal: Proposal,

    /// Proposer address.
    pub proposer: String,

    /// UI helper: whether the current user has liked this proposal.
    pub liked: bool,
}

/// DTO for creating a new proposal.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProposalRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Proposal id must be between 1 and 255 characters"
    ))]
    pub proposal_id: String,

    /// Address of an existing user.
    #[validate(custom(function = validate_address))]
    pub proposer: String,
}

/// Query parameters for listing proposals.
#[derive(Debug, Default, Deserialize)]
pub struct ProposalListParams {
    pub stage: Option<Stage>,

    /// Comma-separated external proposal ids.
    pub proposal_ids: Option<String>,

    /// 'asc' (default) or 'desc' by creation time.
    pub sort_by: Option<String>,
}

/// DTO for moving a proposal to another stage.
#[derive(Debug, Deserialize)]
pub struct UpdateStageRequest {
    pub stage: Stage,
}
