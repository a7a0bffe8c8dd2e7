//! Comment mutations. Each one runs in a single transaction: a failed step
//! rolls back everything before it.

use chrono::Utc;
use sqlx::SqliteConnection;
use validator::Validate;

use crate::{
    error::ActionError,
    forum::{
        Forum, closure,
        notify::Notification,
        policy::{Action, Subject},
        query::find_comment,
    },
    models::{
        comment::{COMMENT_COLUMNS, Comment, CreateCommentRequest},
        proposal::{PROPOSAL_COLUMNS, Proposal},
        user::User,
    },
    utils::html::clean_html,
};

async fn comment_like_exists(
    conn: &mut SqliteConnection,
    user_id: i64,
    comment_id: i64,
) -> Result<bool, sqlx::Error> {
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM comment_likes WHERE user_id = ? AND comment_id = ?",
    )
    .bind(user_id)
    .bind(comment_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(existing.is_some())
}

/// Sets `likes` from a fresh count of like rows, in the caller's transaction.
async fn recount_likes(conn: &mut SqliteConnection, comment_id: i64) -> Result<Comment, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!(
        r#"
        UPDATE comments
        SET likes = (SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?)
        WHERE id = ?
        RETURNING {COMMENT_COLUMNS}
        "#
    ))
    .bind(comment_id)
    .bind(comment_id)
    .fetch_one(&mut *conn)
    .await
}

fn not_found(id: i64) -> ActionError {
    ActionError::NotFound(format!("comment {} not found", id))
}

impl Forum {
    /// Replies to `parent_id` as `actor`. The reply takes the stage of the
    /// proposal owning the thread.
    pub async fn comment(&self, actor: &User, parent_id: i64, body: &str) -> Result<Comment, ActionError> {
        let request = CreateCommentRequest {
            body: body.to_string(),
        };
        request.validate()?;

        // Stored as submitted; markup is sanitized when rendered.
        if clean_html(&request.body).trim().is_empty() {
            return Err(ActionError::InvalidData("body: nothing left after sanitizing".to_string()));
        }

        let mut tx = self.begin_write().await?;

        let parent = find_comment(&mut tx, parent_id)
            .await?
            .ok_or_else(|| not_found(parent_id))?;

        let depth = closure::depth(&mut tx, parent.id)
            .await?
            .ok_or(ActionError::CommentNotLinked)?;

        if depth >= self.settings.max_depth {
            return Err(ActionError::MaximumCommentDepth);
        }

        if !self.policy.can(actor, Action::Comment, &Subject::comment(&parent)) {
            return Err(ActionError::UnauthorizedAction);
        }

        let root_id = closure::root_of(&mut tx, parent.id)
            .await?
            .ok_or(ActionError::CommentNotLinked)?;

        let proposal = sqlx::query_as::<_, Proposal>(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE comment_id = ?"
        ))
        .bind(root_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ActionError::CommentNotLinked)?;

        let comment = sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO comments (parent_id, user_id, body, stage, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(parent.id)
        .bind(actor.id)
        .bind(&request.body)
        .bind(proposal.stage.as_str())
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        closure::insert(&mut tx, comment.id, Some(parent.id)).await?;

        tx.commit().await?;

        tracing::info!(comment_id = comment.id, parent_id = parent.id, "comment created");
        self.notify(Notification::CommentCreated {
            comment_id: comment.id,
            parent_id: parent.id,
            user_id: actor.id,
        });

        Ok(comment)
    }

    /// Soft-deletes one comment. Its replies stay visible.
    pub async fn delete(&self, actor: &User, comment_id: i64) -> Result<Comment, ActionError> {
        let mut tx = self.begin_write().await?;

        let comment = find_comment(&mut tx, comment_id)
            .await?
            .ok_or_else(|| not_found(comment_id))?;

        if comment.is_discarded() {
            return Err(ActionError::AlreadyDeleted);
        }

        if !self.policy.can(actor, Action::Delete, &Subject::comment(&comment)) {
            return Err(ActionError::UnauthorizedAction);
        }

        let deleted = sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET discarded_at = ? WHERE id = ? RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(Utc::now())
        .bind(comment_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(deleted)
    }

    pub async fn like(&self, actor: &User, comment_id: i64) -> Result<Comment, ActionError> {
        let mut tx = self.begin_write().await?;

        let comment = find_comment(&mut tx, comment_id)
            .await?
            .ok_or_else(|| not_found(comment_id))?;

        let liked = comment_like_exists(&mut tx, actor.id, comment_id).await?;
        let subject = Subject::Comment { comment: &comment, liked };
        if !self.policy.can(actor, Action::Like, &subject) {
            return Err(ActionError::AlreadyLiked);
        }

        sqlx::query("INSERT INTO comment_likes (user_id, comment_id, created_at) VALUES (?, ?, ?)")
            .bind(actor.id)
            .bind(comment_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| ActionError::on_unique_violation(e, ActionError::AlreadyLiked))?;

        let updated = recount_likes(&mut tx, comment_id).await?;

        tx.commit().await?;

        self.notify(Notification::CommentLiked {
            comment_id,
            user_id: actor.id,
        });

        Ok(updated)
    }

    pub async fn unlike(&self, actor: &User, comment_id: i64) -> Result<Comment, ActionError> {
        let mut tx = self.begin_write().await?;

        let comment = find_comment(&mut tx, comment_id)
            .await?
            .ok_or_else(|| not_found(comment_id))?;

        let liked = comment_like_exists(&mut tx, actor.id, comment_id).await?;
        let subject = Subject::Comment { comment: &comment, liked };
        if !self.policy.can(actor, Action::Unlike, &subject) {
            return Err(ActionError::NotLiked);
        }

        let removed = sqlx::query("DELETE FROM comment_likes WHERE user_id = ? AND comment_id = ?")
            .bind(actor.id)
            .bind(comment_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            return Err(ActionError::NotLiked);
        }

        let updated = recount_likes(&mut tx, comment_id).await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Bans and discards a comment in one step. Forum admins only.
    pub async fn ban(&self, actor: &User, comment_id: i64) -> Result<Comment, ActionError> {
        let mut tx = self.begin_write().await?;

        let comment = find_comment(&mut tx, comment_id)
            .await?
            .ok_or_else(|| not_found(comment_id))?;

        if comment.is_banned {
            return Err(ActionError::CommentAlreadyBanned);
        }

        if !self.policy.can(actor, Action::Ban, &Subject::comment(&comment)) {
            return Err(ActionError::UnauthorizedAction);
        }

        // Keeps the author's own deletion time if there was one.
        let banned = sqlx::query_as::<_, Comment>(&format!(
            r#"
            UPDATE comments
            SET is_banned = 1, discarded_at = COALESCE(discarded_at, ?)
            WHERE id = ?
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(Utc::now())
        .bind(comment_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(comment_id, admin_id = actor.id, "comment banned");
        self.notify(Notification::CommentBanned {
            comment_id,
            admin_id: actor.id,
        });

        Ok(banned)
    }

    /// Lifts a ban and restores the comment. Forum admins only.
    pub async fn unban(&self, actor: &User, comment_id: i64) -> Result<Comment, ActionError> {
        let mut tx = self.begin_write().await?;

        let comment = find_comment(&mut tx, comment_id)
            .await?
            .ok_or_else(|| not_found(comment_id))?;

        if !comment.is_banned {
            return Err(ActionError::CommentAlreadyUnbanned);
        }

        if !self.policy.can(actor, Action::Unban, &Subject::comment(&comment)) {
            return Err(ActionError::UnauthorizedAction);
        }

        let unbanned = sqlx::query_as::<_, Comment>(&format!(
            r#"
            UPDATE comments
            SET is_banned = 0, discarded_at = NULL
            WHERE id = ?
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(comment_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(comment_id, admin_id = actor.id, "comment unbanned");

        Ok(unbanned)
    }
}
