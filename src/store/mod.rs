//! Persistence seams for users, posts and the follow graph.
//!
//! Handlers and services only see the traits below. Two backends implement
//! them: [`postgres::PgStore`] for deployments and [`memory::MemoryStore`]
//! for local runs without a database and for tests.

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::posts::repo_types::{FeedPost, NewPost, Post};
use crate::users::repo_types::{NewUser, User};

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached; the caller may retry.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate value for {0}")]
    Duplicate(String),
    #[error("storage error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One window of a newest-first listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.clamp(1, Self::MAX_LIMIT),
            offset: offset.max(0),
        }
    }

    /// Same window with one extra row, used to detect whether a next page exists.
    pub(crate) fn probe(self) -> Self {
        Self {
            limit: self.limit + 1,
            offset: self.offset,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;
    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Returns `None` when no user has this id.
    async fn update_profile(
        &self,
        id: Uuid,
        username: &str,
        about_me: Option<&str>,
    ) -> StoreResult<Option<User>>;
    /// Returns `false` when no user has this id.
    async fn touch_last_seen(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<bool>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, new: NewPost) -> StoreResult<Post>;
    async fn posts_by_author(&self, author_id: Uuid, page: Page) -> StoreResult<Vec<FeedPost>>;
    async fn all_posts(&self, page: Page) -> StoreResult<Vec<FeedPost>>;
    /// Posts by `user_id` and everyone it follows, ordered by
    /// `created_at` desc then `id` desc, as one merged sequence.
    async fn timeline(&self, user_id: Uuid, page: Page) -> StoreResult<Vec<FeedPost>>;
}

/// Directed follower -> followed edge set.
///
/// Implementations keep the forward and inverse views consistent: a single
/// insert or delete is visible in both or in neither. Self-edges are rejected
/// by the caller before reaching the store.
#[async_trait]
pub trait FollowStore: Send + Sync {
    /// Returns `true` when a new edge was written.
    async fn insert_follow(&self, follower_id: Uuid, followed_id: Uuid) -> StoreResult<bool>;
    /// Returns `true` when an existing edge was removed.
    async fn delete_follow(&self, follower_id: Uuid, followed_id: Uuid) -> StoreResult<bool>;
    async fn is_following(&self, follower_id: Uuid, followed_id: Uuid) -> StoreResult<bool>;
    async fn followed_ids(&self, user_id: Uuid) -> StoreResult<BTreeSet<Uuid>>;
    async fn follower_ids(&self, user_id: Uuid) -> StoreResult<BTreeSet<Uuid>>;
}

pub trait Store: UserStore + PostStore + FollowStore {}

impl<T> Store for T where T: UserStore + PostStore + FollowStore {}
