//! Flat thread queries and the read path built on them.

use std::ops::RangeInclusive;

use sqlx::SqliteConnection;

use crate::{
    error::ActionError,
    forum::{
        Forum,
        paginate::{Page, paginate},
        tree::build_tree,
        visibility::{present, present_row},
    },
    models::{
        comment::{COMMENT_COLUMNS, Comment, CommentRow, CommentView},
        stage::Stage,
        user::User,
    },
};

/// Ordering of the top level of a thread. Deeper levels are always oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Oldest,
    Latest,
}

impl SortOrder {
    /// `latest` sorts newest first; anything else (or nothing) oldest first.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("latest") => SortOrder::Latest,
            _ => SortOrder::Oldest,
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            SortOrder::Oldest => "c.created_at ASC, c.id ASC",
            SortOrder::Latest => "c.created_at DESC, c.id DESC",
        }
    }
}

/// Pagination criteria for one thread read.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadCriteria {
    /// Id of the last top-level comment already shown.
    pub last_seen_id: Option<i64>,
    pub sort: SortOrder,
}

const ROW_SELECT: &str = r#"
    SELECT
        c.id, c.parent_id, c.user_id, c.body, c.stage, c.likes,
        c.is_banned, c.discarded_at, c.created_at,
        u.address AS user_address,
        cl.id AS like_id
"#;

/// Direct replies to `root_id` in `stage`, joined with `viewer_id`'s likes.
pub async fn top_level(
    conn: &mut SqliteConnection,
    root_id: i64,
    viewer_id: Option<i64>,
    stage: Stage,
    sort: SortOrder,
) -> Result<Vec<CommentRow>, sqlx::Error> {
    let sql = format!(
        r#"
        {ROW_SELECT}
        FROM comments c
        JOIN users u ON u.id = c.user_id
        LEFT JOIN comment_likes cl ON cl.comment_id = c.id AND cl.user_id = ?
        WHERE c.parent_id = ? AND c.stage = ?
        ORDER BY {}
        "#,
        sort.order_by()
    );

    sqlx::query_as::<_, CommentRow>(&sql)
        .bind(viewer_id)
        .bind(root_id)
        .bind(stage.as_str())
        .fetch_all(&mut *conn)
        .await
}

/// Descendants of `root_id` whose generation falls in `window`, oldest first.
pub async fn descendants(
    conn: &mut SqliteConnection,
    root_id: i64,
    viewer_id: Option<i64>,
    stage: Stage,
    window: RangeInclusive<i64>,
) -> Result<Vec<CommentRow>, sqlx::Error> {
    let sql = format!(
        r#"
        {ROW_SELECT}
        FROM comment_hierarchies h
        JOIN comments c ON c.id = h.descendant_id
        JOIN users u ON u.id = c.user_id
        LEFT JOIN comment_likes cl ON cl.comment_id = c.id AND cl.user_id = ?
        WHERE h.ancestor_id = ?
          AND h.generations BETWEEN ? AND ?
          AND c.stage = ?
        ORDER BY {}
        "#,
        SortOrder::Oldest.order_by()
    );

    sqlx::query_as::<_, CommentRow>(&sql)
        .bind(viewer_id)
        .bind(root_id)
        .bind(*window.start())
        .bind(*window.end())
        .bind(stage.as_str())
        .fetch_all(&mut *conn)
        .await
}

/// Drops the already-seen prefix of the ordered top level, up to and
/// including `last_seen_id`. An unknown cursor drops nothing.
pub fn skip_seen(rows: Vec<CommentRow>, last_seen_id: Option<i64>) -> Vec<CommentRow> {
    let Some(last_seen_id) = last_seen_id else {
        return rows;
    };

    match rows.iter().position(|r| r.comment.id == last_seen_id) {
        Some(pos) => rows.into_iter().skip(pos + 1).collect(),
        None => rows,
    }
}

/// The flat row set for one thread read: the (cursor-trimmed) top level
/// followed by generations `2..=fetch_depth` below `root_id`.
pub async fn fetch_thread(
    conn: &mut SqliteConnection,
    root_id: i64,
    viewer_id: Option<i64>,
    stage: Stage,
    criteria: ThreadCriteria,
    fetch_depth: i64,
) -> Result<Vec<CommentRow>, sqlx::Error> {
    let top = top_level(conn, root_id, viewer_id, stage, criteria.sort).await?;
    let mut rows = skip_seen(top, criteria.last_seen_id);

    if fetch_depth >= 2 {
        rows.extend(descendants(conn, root_id, viewer_id, stage, 2..=fetch_depth).await?);
    }

    Ok(rows)
}

pub(crate) async fn find_comment(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Single comment joined like a thread row.
pub async fn find_row(
    conn: &mut SqliteConnection,
    id: i64,
    viewer_id: Option<i64>,
) -> Result<Option<CommentRow>, sqlx::Error> {
    let sql = format!(
        r#"
        {ROW_SELECT}
        FROM comments c
        JOIN users u ON u.id = c.user_id
        LEFT JOIN comment_likes cl ON cl.comment_id = c.id AND cl.user_id = ?
        WHERE c.id = ?
        "#
    );

    sqlx::query_as::<_, CommentRow>(&sql)
        .bind(viewer_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

impl Forum {
    pub async fn find_comment(&self, id: i64) -> Result<Comment, ActionError> {
        let mut conn = self.pool.acquire().await?;
        find_comment(&mut conn, id)
            .await?
            .ok_or_else(|| ActionError::NotFound(format!("comment {} not found", id)))
    }

    /// One comment as `viewer` sees it, without replies.
    pub async fn comment_view(&self, id: i64, viewer: Option<&User>) -> Result<CommentView, ActionError> {
        let mut conn = self.pool.acquire().await?;
        let row = find_row(&mut conn, id, viewer.map(|v| v.id))
            .await?
            .ok_or_else(|| ActionError::NotFound(format!("comment {} not found", id)))?;

        Ok(present_row(row, viewer, Page::empty()))
    }

    /// Reads the paginated thread below `root_id` for `viewer`.
    ///
    /// Two queries (top level, then a bounded window of deeper generations),
    /// rebuilt into a tree, trimmed per level and redacted for the viewer.
    /// Replies deeper than the window need another read rooted further down.
    pub async fn thread(
        &self,
        root_id: i64,
        viewer: Option<&User>,
        stage: Stage,
        criteria: ThreadCriteria,
    ) -> Result<Page<CommentView>, ActionError> {
        let mut conn = self.pool.acquire().await?;

        if find_comment(&mut conn, root_id).await?.is_none() {
            return Err(ActionError::NotFound(format!("comment {} not found", root_id)));
        }

        let rows = fetch_thread(
            &mut conn,
            root_id,
            viewer.map(|v| v.id),
            stage,
            criteria,
            self.settings.fetch_depth(),
        )
        .await?;

        let tree = build_tree(rows, root_id);
        let page = paginate(tree, &self.settings.page_sizes);

        Ok(present(page, viewer))
    }
}
