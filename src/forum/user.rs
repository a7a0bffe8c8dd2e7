use chrono::Utc;
use rand::Rng;
use sqlx::SqliteConnection;
use validator::Validate;

use crate::{
    error::ActionError,
    forum::Forum,
    models::user::{CreateUserRequest, User},
};

const USER_COLUMNS: &str = "id, address, uid, is_forum_admin, created_at";

/// Upper bound (exclusive) of the public `uid`.
const UID_RANGE: i64 = 1_000_000;

pub(crate) async fn find_user_by_address(
    conn: &mut SqliteConnection,
    address: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE address = ?"))
        .bind(address)
        .fetch_optional(&mut *conn)
        .await
}

fn random_uid() -> i64 {
    rand::thread_rng().gen_range(0..UID_RANGE)
}

/// Draws uids until one is free.
async fn fresh_uid(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    loop {
        let uid = random_uid();
        let taken = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE uid = ?")
            .bind(uid)
            .fetch_optional(&mut *conn)
            .await?;
        if taken.is_none() {
            return Ok(uid);
        }
    }
}

impl Forum {
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, ActionError> {
        request.validate()?;

        let mut tx = self.begin_write().await?;

        let uid = fresh_uid(&mut tx).await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (address, uid, is_forum_admin, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&request.address)
        .bind(uid)
        .bind(request.is_forum_admin)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(user_id = user.id, uid = user.uid, "user created");

        Ok(user)
    }

    pub async fn find_user(&self, id: i64) -> Result<Option<User>, ActionError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn find_user_by_address(&self, address: &str) -> Result<Option<User>, ActionError> {
        let mut conn = self.pool.acquire().await?;
        Ok(find_user_by_address(&mut conn, address).await?)
    }

    /// Makes sure `address` exists and is a forum admin.
    pub async fn ensure_forum_admin(&self, address: &str) -> Result<User, ActionError> {
        if let Some(user) = self.find_user_by_address(address).await? {
            if user.is_forum_admin {
                return Ok(user);
            }
            let promoted = sqlx::query_as::<_, User>(&format!(
                "UPDATE users SET is_forum_admin = 1 WHERE id = ? RETURNING {USER_COLUMNS}"
            ))
            .bind(user.id)
            .fetch_one(&self.pool)
            .await?;
            return Ok(promoted);
        }

        self.create_user(CreateUserRequest {
            address: address.to_string(),
            is_forum_admin: true,
        })
        .await
    }
}
