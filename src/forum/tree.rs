use std::collections::HashMap;

use crate::models::comment::CommentRow;

/// A fetched comment with every fetched reply nested under it.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub row: CommentRow,
    pub replies: Vec<TreeNode>,
}

impl TreeNode {
    pub fn id(&self) -> i64 {
        self.row.comment.id
    }
}

/// Rebuilds the nesting below `root_id` from a flat row set.
///
/// Children are linked by id lookup, so the order of `rows` only decides the
/// order of siblings. Rows whose parent is not in the set (deeper than the
/// fetched window) are dropped.
pub fn build_tree(rows: Vec<CommentRow>, root_id: i64) -> Vec<TreeNode> {
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut by_id: HashMap<i64, CommentRow> = HashMap::with_capacity(rows.len());

    for row in rows {
        let id = row.comment.id;
        if by_id.contains_key(&id) {
            continue;
        }
        if let Some(parent_id) = row.comment.parent_id {
            children.entry(parent_id).or_default().push(id);
        }
        by_id.insert(id, row);
    }

    attach(root_id, &mut by_id, &children)
}

fn attach(
    parent_id: i64,
    by_id: &mut HashMap<i64, CommentRow>,
    children: &HashMap<i64, Vec<i64>>,
) -> Vec<TreeNode> {
    let Some(ids) = children.get(&parent_id) else {
        return Vec::new();
    };

    ids.iter()
        .filter_map(|id| {
            let row = by_id.remove(id)?;
            let replies = attach(*id, by_id, children);
            Some(TreeNode { row, replies })
        })
        .collect()
}
