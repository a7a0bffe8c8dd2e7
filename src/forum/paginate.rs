use serde::Serialize;

use crate::{forum::tree::TreeNode, models::comment::CommentRow};

/// One page of a list, with whether anything was cut off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub has_more: bool,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            has_more: false,
            data: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            has_more: self.has_more,
            data: self.data.into_iter().map(f).collect(),
        }
    }
}

/// A tree node whose replies have been trimmed to a page.
#[derive(Debug, Clone)]
pub struct PagedNode {
    pub row: CommentRow,
    pub replies: Page<PagedNode>,
}

/// Trims every level of `nodes` to its own limit: `limits[0]` for this level,
/// `limits[1]` for their replies, and so on. Past the last limit nothing is
/// returned, but `has_more` still reports whether replies exist.
pub fn paginate(nodes: Vec<TreeNode>, limits: &[usize]) -> Page<PagedNode> {
    if nodes.is_empty() {
        return Page::empty();
    }

    let Some((&limit, deeper)) = limits.split_first() else {
        return Page {
            has_more: true,
            data: Vec::new(),
        };
    };

    let has_more = nodes.len() > limit;
    let data = nodes
        .into_iter()
        .take(limit)
        .map(|node| PagedNode {
            row: node.row,
            replies: paginate(node.replies, deeper),
        })
        .collect();

    Page { has_more, data }
}
