// tests/common/mod.rs

#![allow(dead_code)]

use forum_backend::{
    Forum, ThreadSettings,
    models::{comment::Comment, proposal::{CreateProposalRequest, Proposal}, user::{CreateUserRequest, User}},
};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::PathBuf;

/// In-memory database with the schema applied.
///
/// A single, never-recycled connection: every connection to `:memory:` is
/// its own database.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    pool
}

/// A database file under the temp dir, removed (with its WAL files) on drop.
pub struct TempDatabase {
    path: PathBuf,
}

impl TempDatabase {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("forum-{}.db", uuid::Uuid::new_v4()));
        Self { path }
    }

    pub fn url(&self) -> String {
        format!("sqlite://{}", self.path.display())
    }
}

impl Drop for TempDatabase {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

/// File-backed forum with the same pool setup as the server.
pub async fn file_forum(max_connections: u32) -> (Forum, TempDatabase) {
    let database = TempDatabase::new();
    let pool = forum_backend::db::connect(&database.url(), max_connections)
        .await
        .expect("Failed to open SQLite file");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    (Forum::new(pool, ThreadSettings::default()), database)
}

pub async fn forum_with(settings: ThreadSettings) -> Forum {
    Forum::new(memory_pool().await, settings)
}

pub async fn forum() -> Forum {
    forum_with(ThreadSettings::default()).await
}

/// A fresh, unique wallet address.
pub fn address() -> String {
    // 32 hex digits from the uuid, padded to 40.
    format!("0x{}00000000", uuid::Uuid::new_v4().simple())
}

pub async fn user(forum: &Forum) -> User {
    forum
        .create_user(CreateUserRequest {
            address: address(),
            is_forum_admin: false,
        })
        .await
        .expect("Failed to create user")
}

pub async fn admin(forum: &Forum) -> User {
    forum
        .create_user(CreateUserRequest {
            address: address(),
            is_forum_admin: true,
        })
        .await
        .expect("Failed to create admin")
}

pub async fn proposal(forum: &Forum, proposer: &User) -> Proposal {
    forum
        .create_proposal(CreateProposalRequest {
            proposal_id: format!("p-{}", uuid::Uuid::new_v4()),
            proposer: proposer.address.clone(),
        })
        .await
        .expect("Failed to create proposal")
}

pub async fn reply(forum: &Forum, author: &User, parent_id: i64, body: &str) -> Comment {
    forum
        .comment(author, parent_id, body)
        .await
        .expect("Failed to create comment")
}
