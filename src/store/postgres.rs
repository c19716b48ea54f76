use std::collections::BTreeSet;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use super::{FollowStore, Page, PostStore, StoreError, StoreResult, UserStore};
use crate::posts::repo_types::{FeedPost, NewPost, Post};
use crate::users::repo_types::{NewUser, User};

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Duplicate(db.constraint().unwrap_or("unique").to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, about_me, last_seen, created_at";

const FEED_SELECT: &str = r#"
    SELECT p.id, p.body, p.created_at, p.user_id AS author_id, u.username AS author_username
      FROM posts p
      JOIN users u ON u.id = p.user_id
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        info!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        username: &str,
        about_me: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET username = $2, about_me = $3
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(username)
        .bind(about_me)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn touch_last_seen(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET last_seen = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn create_post(&self, new: NewPost) -> StoreResult<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, body, created_at, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, body, created_at, user_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.body)
        .bind(new.created_at)
        .bind(new.user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    async fn posts_by_author(&self, author_id: Uuid, page: Page) -> StoreResult<Vec<FeedPost>> {
        let rows = sqlx::query_as::<_, FeedPost>(&format!(
            r#"{FEED_SELECT}
             WHERE p.user_id = $1
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(author_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn all_posts(&self, page: Page) -> StoreResult<Vec<FeedPost>> {
        let rows = sqlx::query_as::<_, FeedPost>(&format!(
            r#"{FEED_SELECT}
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $1 OFFSET $2
            "#
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn timeline(&self, user_id: Uuid, page: Page) -> StoreResult<Vec<FeedPost>> {
        let rows = sqlx::query_as::<_, FeedPost>(&format!(
            r#"{FEED_SELECT}
             WHERE p.user_id = $1
                OR p.user_id IN (SELECT followed_id FROM followers WHERE follower_id = $1)
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl FollowStore for PgStore {
    async fn insert_follow(&self, follower_id: Uuid, followed_id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO followers (follower_id, followed_id)
            VALUES ($1, $2)
            ON CONFLICT (follower_id, followed_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        debug!(%follower_id, %followed_id, rows = result.rows_affected(), "insert follow");
        Ok(result.rows_affected() == 1)
    }

    async fn delete_follow(&self, follower_id: Uuid, followed_id: Uuid) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "DELETE FROM followers WHERE follower_id = $1 AND followed_id = $2",
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        debug!(%follower_id, %followed_id, rows = result.rows_affected(), "delete follow");
        Ok(result.rows_affected() == 1)
    }

    async fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> StoreResult<bool> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM followers WHERE follower_id = $1 AND followed_id = $2
            )
            "#,
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn followed_ids(&self, user_id: Uuid) -> StoreResult<BTreeSet<Uuid>> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT followed_id FROM followers WHERE follower_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }

    async fn follower_ids(&self, user_id: Uuid) -> StoreResult<BTreeSet<Uuid>> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT follower_id FROM followers WHERE followed_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }
}
