use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{
    forum::paginate::Page,
    models::{stage::Stage, user::Author},
};

/// Body of the sentinel comment every proposal thread hangs from.
pub const ROOT_BODY: &str = "ROOT";

/// Column list matching [`Comment`], for `SELECT`/`RETURNING` clauses.
pub const COMMENT_COLUMNS: &str =
    "id, parent_id, user_id, body, stage, likes, is_banned, discarded_at, created_at";

/// Represents the 'comments' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub user_id: i64,
    pub body: String,
    #[sqlx(try_from = "String")]
    pub stage: Stage,
    /// Denormalized count of `comment_likes` rows.
    pub likes: i64,
    pub is_banned: bool,
    /// Soft-delete marker.
    pub discarded_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Comment {
    pub fn is_discarded(&self) -> bool {
        self.discarded_at.is_some()
    }

    /// Root comments are the proposal-owned sentinels; they have no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A comment as it comes out of a thread query: joined with its author's
/// address and the viewer's like row (if any).
#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    #[sqlx(flatten)]
    pub comment: Comment,
    pub user_address: String,
    pub like_id: Option<i64>,
}

/// DTO for replying to a comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 10000,
        message = "Comment must be between 1 and 10000 characters"
    ))]
    pub body: String,
}

/// Query parameters for reading a comment thread.
#[derive(Debug, Default, Deserialize)]
pub struct ThreadParams {
    /// Stage to read; defaults to the stage of the proposal (or parent comment).
    pub stage: Option<Stage>,

    /// Cursor: id of the last top-level comment of the previous page.
    pub last_seen_id: Option<i64>,

    /// 'latest' for newest first; anything else is oldest first.
    pub sort_by: Option<String>,
}

/// Serialized comment after the visibility rules for a given viewer ran.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub stage: Stage,
    /// `null` if the comment is deleted or banned (unless the viewer is a forum admin).
    pub body: Option<String>,
    /// Only visible to forum admins.
    pub is_banned: Option<bool>,
    /// `null` without a current user.
    pub likes: Option<i64>,
    /// `null` without a current user.
    pub liked: Option<bool>,
    pub like_id: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub user: Author,
    pub replies: Page<CommentView>,
}
