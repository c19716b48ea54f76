//! The follow graph: a directed edge set over user ids.
//!
//! Ids are trusted as given; resolving usernames and rejecting unknown users
//! is the caller's job. Unknown ids simply have no edges.

use std::collections::BTreeSet;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::follows::dto::{FollowResponse, FollowStatus};
use crate::store::Store;
use crate::users::services::find_by_username;

/// Adds `follower_id -> followed_id`. Returns whether a new edge was written.
pub async fn follow(store: &dyn Store, follower_id: Uuid, followed_id: Uuid) -> Result<bool, AppError> {
    if follower_id == followed_id {
        return Err(AppError::SelfFollowRejected);
    }
    let added = store.insert_follow(follower_id, followed_id).await?;
    debug!(%follower_id, %followed_id, added, "follow");
    Ok(added)
}

/// Removes `follower_id -> followed_id` if present.
pub async fn unfollow(store: &dyn Store, follower_id: Uuid, followed_id: Uuid) -> Result<bool, AppError> {
    let removed = store.delete_follow(follower_id, followed_id).await?;
    debug!(%follower_id, %followed_id, removed, "unfollow");
    Ok(removed)
}

pub async fn is_following(store: &dyn Store, follower_id: Uuid, followed_id: Uuid) -> Result<bool, AppError> {
    if follower_id == followed_id {
        return Ok(false);
    }
    Ok(store.is_following(follower_id, followed_id).await?)
}

pub async fn followed_ids(store: &dyn Store, user_id: Uuid) -> Result<BTreeSet<Uuid>, AppError> {
    Ok(store.followed_ids(user_id).await?)
}

pub async fn followers_of(store: &dyn Store, user_id: Uuid) -> Result<BTreeSet<Uuid>, AppError> {
    Ok(store.follower_ids(user_id).await?)
}

pub async fn follow_username(
    store: &dyn Store,
    caller: Uuid,
    username: &str,
) -> Result<FollowResponse, AppError> {
    let target = find_by_username(store, username).await?;
    let changed = follow(store, caller, target.id).await?;
    info!(user_id = %caller, target = %target.username, changed, "followed");
    Ok(FollowResponse {
        status: FollowStatus::Followed,
        user_id: target.id,
        changed,
    })
}

pub async fn unfollow_username(
    store: &dyn Store,
    caller: Uuid,
    username: &str,
) -> Result<FollowResponse, AppError> {
    let target = find_by_username(store, username).await?;
    let changed = unfollow(store, caller, target.id).await?;
    info!(user_id = %caller, target = %target.username, changed, "unfollowed");
    Ok(FollowResponse {
        status: FollowStatus::Unfollowed,
        user_id: target.id,
        changed,
    })
}
