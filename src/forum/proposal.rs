use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use validator::Validate;

use crate::{
    error::ActionError,
    forum::{
        Forum, closure,
        notify::Notification,
        paginate::Page,
        policy::{Action, Subject},
        query::{SortOrder, ThreadCriteria},
        user::find_user_by_address,
    },
    models::{
        comment::{COMMENT_COLUMNS, Comment, CommentView, ROOT_BODY, ThreadParams},
        proposal::{CreateProposalRequest, PROPOSAL_COLUMNS, Proposal, ProposalListParams, ProposalResponse},
        stage::Stage,
        user::User,
    },
};

const RESPONSE_SELECT: &str = r#"
    SELECT
        p.id, p.proposal_id, p.user_id, p.comment_id, p.stage, p.likes, p.created_at,
        u.address AS proposer,
        (pl.id IS NOT NULL) AS liked
    FROM proposals p
    JOIN users u ON u.id = p.user_id
    LEFT JOIN proposal_likes pl ON pl.proposal_id = p.id AND pl.user_id = "#;

async fn find_proposal(
    conn: &mut SqliteConnection,
    proposal_id: &str,
) -> Result<Option<Proposal>, sqlx::Error> {
    sqlx::query_as::<_, Proposal>(&format!(
        "SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE proposal_id = ?"
    ))
    .bind(proposal_id)
    .fetch_optional(&mut *conn)
    .await
}

async fn proposal_like_exists(
    conn: &mut SqliteConnection,
    user_id: i64,
    proposal: i64,
) -> Result<bool, sqlx::Error> {
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM proposal_likes WHERE user_id = ? AND proposal_id = ?",
    )
    .bind(user_id)
    .bind(proposal)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(existing.is_some())
}

async fn recount_proposal_likes(conn: &mut SqliteConnection, proposal: i64) -> Result<Proposal, sqlx::Error> {
    sqlx::query_as::<_, Proposal>(&format!(
        r#"
        UPDATE proposals
        SET likes = (SELECT COUNT(*) FROM proposal_likes WHERE proposal_id = ?)
        WHERE id = ?
        RETURNING {PROPOSAL_COLUMNS}
        "#
    ))
    .bind(proposal)
    .bind(proposal)
    .fetch_one(&mut *conn)
    .await
}

fn not_found(proposal_id: &str) -> ActionError {
    ActionError::NotFound(format!("proposal '{}' not found", proposal_id))
}

impl Forum {
    /// Creates a proposal at the `idea` stage together with the `ROOT`
    /// comment its threads hang from.
    pub async fn create_proposal(&self, request: CreateProposalRequest) -> Result<Proposal, ActionError> {
        request.validate()?;

        let mut tx = self.begin_write().await?;

        let proposer = find_user_by_address(&mut tx, &request.proposer)
            .await?
            .ok_or_else(|| ActionError::InvalidData(format!("proposer: user '{}' not found", request.proposer)))?;

        let stage = Stage::Idea;
        let now = Utc::now();

        let root = sqlx::query_as::<_, Comment>(&format!(
            r#"
            INSERT INTO comments (parent_id, user_id, body, stage, created_at)
            VALUES (NULL, ?, ?, ?, ?)
            RETURNING {COMMENT_COLUMNS}
            "#
        ))
        .bind(proposer.id)
        .bind(ROOT_BODY)
        .bind(stage.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        closure::insert(&mut tx, root.id, None).await?;

        let proposal = sqlx::query_as::<_, Proposal>(&format!(
            r#"
            INSERT INTO proposals (proposal_id, user_id, comment_id, stage, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING {PROPOSAL_COLUMNS}
            "#
        ))
        .bind(&request.proposal_id)
        .bind(proposer.id)
        .bind(root.id)
        .bind(stage.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(proposal_id = %proposal.proposal_id, "proposal created");

        Ok(proposal)
    }

    /// Proposal by external id, with `liked` for `viewer`.
    pub async fn find_proposal(
        &self,
        proposal_id: &str,
        viewer: Option<&User>,
    ) -> Result<ProposalResponse, ActionError> {
        sqlx::query_as::<_, ProposalResponse>(&format!("{RESPONSE_SELECT} ? WHERE p.proposal_id = ?"))
            .bind(viewer.map(|v| v.id))
            .bind(proposal_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(proposal_id))
    }

    /// Proposals filtered by stage and ids, by creation time
    /// (`desc` newest first, anything else oldest first).
    pub async fn list_proposals(
        &self,
        params: &ProposalListParams,
        viewer: Option<&User>,
    ) -> Result<Vec<ProposalResponse>, ActionError> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(RESPONSE_SELECT);
        builder.push_bind(viewer.map(|v| v.id));
        builder.push(" WHERE 1 = 1");

        if let Some(stage) = params.stage {
            builder.push(" AND p.stage = ").push_bind(stage.as_str());
        }

        if let Some(ids) = &params.proposal_ids {
            let ids: Vec<&str> = ids.split(',').map(str::trim).filter(|id| !id.is_empty()).collect();
            if !ids.is_empty() {
                builder.push(" AND p.proposal_id IN (");
                let mut separated = builder.separated(", ");
                for id in ids {
                    separated.push_bind(id.to_string());
                }
                separated.push_unseparated(")");
            }
        }

        match params.sort_by.as_deref() {
            Some("desc") => builder.push(" ORDER BY p.created_at DESC, p.id DESC"),
            _ => builder.push(" ORDER BY p.created_at ASC, p.id ASC"),
        };

        let proposals = builder
            .build_query_as::<ProposalResponse>()
            .fetch_all(&self.pool)
            .await?;

        Ok(proposals)
    }

    pub async fn like_proposal(&self, actor: &User, proposal_id: &str) -> Result<Proposal, ActionError> {
        let mut tx = self.begin_write().await?;

        let proposal = find_proposal(&mut tx, proposal_id)
            .await?
            .ok_or_else(|| not_found(proposal_id))?;

        let liked = proposal_like_exists(&mut tx, actor.id, proposal.id).await?;
        let subject = Subject::Proposal { proposal: &proposal, liked };
        if !self.policy.can(actor, Action::Like, &subject) {
            return Err(ActionError::AlreadyLiked);
        }

        sqlx::query("INSERT INTO proposal_likes (user_id, proposal_id, created_at) VALUES (?, ?, ?)")
            .bind(actor.id)
            .bind(proposal.id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| ActionError::on_unique_violation(e, ActionError::AlreadyLiked))?;

        let updated = recount_proposal_likes(&mut tx, proposal.id).await?;

        tx.commit().await?;

        self.notify(Notification::ProposalLiked {
            proposal_id: updated.proposal_id.clone(),
            user_id: actor.id,
        });

        Ok(updated)
    }

    pub async fn unlike_proposal(&self, actor: &User, proposal_id: &str) -> Result<Proposal, ActionError> {
        let mut tx = self.begin_write().await?;

        let proposal = find_proposal(&mut tx, proposal_id)
            .await?
            .ok_or_else(|| not_found(proposal_id))?;

        let liked = proposal_like_exists(&mut tx, actor.id, proposal.id).await?;
        let subject = Subject::Proposal { proposal: &proposal, liked };
        if !self.policy.can(actor, Action::Unlike, &subject) {
            return Err(ActionError::NotLiked);
        }

        sqlx::query("DELETE FROM proposal_likes WHERE user_id = ? AND proposal_id = ?")
            .bind(actor.id)
            .bind(proposal.id)
            .execute(&mut *tx)
            .await?;

        let updated = recount_proposal_likes(&mut tx, proposal.id).await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Moves a proposal to `stage`; replies posted afterwards inherit it.
    pub async fn update_proposal_stage(
        &self,
        actor: &User,
        proposal_id: &str,
        stage: Stage,
    ) -> Result<Proposal, ActionError> {
        let mut tx = self.begin_write().await?;

        let proposal = find_proposal(&mut tx, proposal_id)
            .await?
            .ok_or_else(|| not_found(proposal_id))?;

        let subject = Subject::Proposal { proposal: &proposal, liked: false };
        if !self.policy.can(actor, Action::SetStage, &subject) {
            return Err(ActionError::UnauthorizedAction);
        }

        let updated = sqlx::query_as::<_, Proposal>(&format!(
            "UPDATE proposals SET stage = ? WHERE id = ? RETURNING {PROPOSAL_COLUMNS}"
        ))
        .bind(stage.as_str())
        .bind(proposal.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(proposal_id, %stage, "proposal stage updated");

        Ok(updated)
    }

    /// Comment threads of a proposal, read from its `ROOT` comment. Defaults
    /// to the proposal's current stage.
    pub async fn proposal_threads(
        &self,
        proposal_id: &str,
        viewer: Option<&User>,
        params: &ThreadParams,
    ) -> Result<Page<CommentView>, ActionError> {
        let proposal = {
            let mut conn = self.pool.acquire().await?;
            find_proposal(&mut conn, proposal_id)
                .await?
                .ok_or_else(|| not_found(proposal_id))?
        };

        let criteria = ThreadCriteria {
            last_seen_id: params.last_seen_id,
            sort: SortOrder::from_param(params.sort_by.as_deref()),
        };

        self.thread(
            proposal.comment_id,
            viewer,
            params.stage.unwrap_or(proposal.stage),
            criteria,
        )
        .await
    }
}
