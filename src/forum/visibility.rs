use crate::{
    forum::paginate::{Page, PagedNode},
    models::{
        comment::{Comment, CommentRow, CommentView},
        user::{Author, User},
    },
    utils::html::clean_html,
};

fn is_admin(viewer: Option<&User>) -> bool {
    viewer.is_some_and(|v| v.is_forum_admin)
}

/// Body as the viewer may read it, sanitized for rendering. Deleted or banned
/// comments read as `None`, except that forum admins still read banned ones.
pub fn visible_body(comment: &Comment, viewer: Option<&User>) -> Option<String> {
    if comment.is_banned && is_admin(viewer) {
        return Some(clean_html(&comment.body));
    }
    if comment.is_discarded() || comment.is_banned {
        return None;
    }
    Some(clean_html(&comment.body))
}

/// Serializes one fetched comment for `viewer`.
pub fn present_row(row: CommentRow, viewer: Option<&User>, replies: Page<CommentView>) -> CommentView {
    let CommentRow {
        comment,
        user_address,
        like_id,
    } = row;

    let body = visible_body(&comment, viewer);
    let is_banned = is_admin(viewer).then_some(comment.is_banned);
    let (likes, liked) = match viewer {
        Some(_) => (Some(comment.likes), Some(like_id.is_some())),
        None => (None, None),
    };

    CommentView {
        id: comment.id,
        parent_id: comment.parent_id,
        stage: comment.stage,
        body,
        is_banned,
        likes,
        liked,
        like_id: viewer.and(like_id),
        created_at: comment.created_at,
        user: Author {
            id: comment.user_id,
            address: user_address,
        },
        replies,
    }
}

/// Serializes a paginated thread for `viewer`. Replies of deleted comments
/// stay in place; only the deleted comment's own body is hidden.
pub fn present(page: Page<PagedNode>, viewer: Option<&User>) -> Page<CommentView> {
    page.map(|node| {
        let replies = present(node.replies, viewer);
        present_row(node.row, viewer, replies)
    })
}
