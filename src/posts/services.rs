use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::posts::dto::{CreatePostRequest, FeedPage};
use crate::posts::repo_types::{FeedPost, NewPost, Post};
use crate::store::{Page, Store};
use crate::users::services::find_by_username;
use crate::validation::{max_len, required, Validator};

pub const MAX_BODY_CHARS: usize = 140;

fn post_rules() -> Validator<CreatePostRequest> {
    Validator::new()
        .rule("body", |r: &CreatePostRequest| required(&r.body))
        .rule("body", |r: &CreatePostRequest| max_len(&r.body, MAX_BODY_CHARS))
}

/// Cuts the probe row off a `page.probe()` result and records whether it existed.
fn into_page(mut posts: Vec<FeedPost>, page: Page) -> FeedPage {
    let next_offset = if posts.len() as i64 > page.limit {
        posts.truncate(page.limit as usize);
        Some(page.offset + page.limit)
    } else {
        None
    };
    FeedPage { posts, next_offset }
}

pub async fn create_post(
    store: &dyn Store,
    author_id: Uuid,
    mut req: CreatePostRequest,
) -> Result<Post, AppError> {
    req.body = req.body.trim().to_string();
    post_rules().validate(&req)?;

    let post = store
        .create_post(NewPost {
            user_id: author_id,
            body: req.body,
            created_at: OffsetDateTime::now_utc(),
        })
        .await?;
    info!(post_id = %post.id, user_id = %author_id, "post created");
    Ok(post)
}

/// The caller's own posts merged with those of everyone they follow.
pub async fn timeline(store: &dyn Store, user_id: Uuid, page: Page) -> Result<FeedPage, AppError> {
    let rows = store.timeline(user_id, page.probe()).await?;
    Ok(into_page(rows, page))
}

pub async fn explore(store: &dyn Store, page: Page) -> Result<FeedPage, AppError> {
    let rows = store.all_posts(page.probe()).await?;
    Ok(into_page(rows, page))
}

pub async fn posts_of(store: &dyn Store, username: &str, page: Page) -> Result<FeedPage, AppError> {
    let author = find_by_username(store, username).await?;
    let rows = store.posts_by_author(author.id, page.probe()).await?;
    Ok(into_page(rows, page))
}
