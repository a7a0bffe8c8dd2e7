//! Closure table over `comments`: one `comment_hierarchies` row per
//! (ancestor, descendant) pair, with the generation distance between them.

use std::fmt;

use sqlx::{Connection, FromRow, SqliteConnection};

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Hierarchy {
    pub ancestor_id: i64,
    pub descendant_id: i64,
    pub generations: i64,
}

#[derive(Debug)]
pub enum ClosureError {
    /// The parent has no closure rows, i.e. it is not part of any tree.
    MissingParent(i64),
    /// The node is already linked somewhere, or would become its own ancestor.
    Cycle(i64),
    Database(sqlx::Error),
}

impl fmt::Display for ClosureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosureError::MissingParent(id) => write!(f, "parent comment {} is not in any tree", id),
            ClosureError::Cycle(id) => write!(f, "comment {} is already linked", id),
            ClosureError::Database(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ClosureError {}

impl From<sqlx::Error> for ClosureError {
    fn from(err: sqlx::Error) -> Self {
        ClosureError::Database(err)
    }
}

/// Links `node` under `parent` (or as a new root when `parent` is `None`).
///
/// Inserts the self-row plus one row per ancestor of `parent`, inside a
/// savepoint: on any failure nothing is written. Returns the number of rows
/// inserted.
pub async fn insert(
    conn: &mut SqliteConnection,
    node: i64,
    parent: Option<i64>,
) -> Result<u64, ClosureError> {
    if parent == Some(node) {
        return Err(ClosureError::Cycle(node));
    }

    let mut tx = conn.begin().await?;

    let linked: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM comment_hierarchies WHERE descendant_id = ?")
            .bind(node)
            .fetch_one(&mut *tx)
            .await?;

    if linked > 0 {
        return Err(ClosureError::Cycle(node));
    }

    let mut inserted = 0;

    if let Some(parent) = parent {
        inserted = sqlx::query(
            r#"
            INSERT INTO comment_hierarchies (ancestor_id, descendant_id, generations)
            SELECT ancestor_id, ?, generations + 1
            FROM comment_hierarchies
            WHERE descendant_id = ?
            "#,
        )
        .bind(node)
        .bind(parent)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Err(ClosureError::MissingParent(parent));
        }
    }

    inserted += sqlx::query(
        "INSERT INTO comment_hierarchies (ancestor_id, descendant_id, generations) VALUES (?, ?, 0)",
    )
    .bind(node)
    .bind(node)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    Ok(inserted)
}

/// All descendants of `node` at distance `1..=max_generation`, nearest first.
pub async fn descendants_within(
    conn: &mut SqliteConnection,
    node: i64,
    max_generation: i64,
) -> Result<Vec<Hierarchy>, sqlx::Error> {
    sqlx::query_as::<_, Hierarchy>(
        r#"
        SELECT ancestor_id, descendant_id, generations
        FROM comment_hierarchies
        WHERE ancestor_id = ? AND generations BETWEEN 1 AND ?
        ORDER BY generations, descendant_id
        "#,
    )
    .bind(node)
    .bind(max_generation)
    .fetch_all(&mut *conn)
    .await
}

/// Distance from the tree root (the root itself is 0). `None` if `node` is
/// not linked into any tree.
pub async fn depth(conn: &mut SqliteConnection, node: i64) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<i64>>(
        "SELECT MAX(generations) FROM comment_hierarchies WHERE descendant_id = ?",
    )
    .bind(node)
    .fetch_one(&mut *conn)
    .await
}

/// The root of the tree containing `node`.
pub async fn root_of(conn: &mut SqliteConnection, node: i64) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT ancestor_id
        FROM comment_hierarchies
        WHERE descendant_id = ?
        ORDER BY generations DESC
        LIMIT 1
        "#,
    )
    .bind(node)
    .fetch_optional(&mut *conn)
    .await
}

/// Ancestors of `node` from its parent up to the root.
pub async fn ancestors(conn: &mut SqliteConnection, node: i64) -> Result<Vec<Hierarchy>, sqlx::Error> {
    sqlx::query_as::<_, Hierarchy>(
        r#"
        SELECT ancestor_id, descendant_id, generations
        FROM comment_hierarchies
        WHERE descendant_id = ? AND generations > 0
        ORDER BY generations
        "#,
    )
    .bind(node)
    .fetch_all(&mut *conn)
    .await
}
