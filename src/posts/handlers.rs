use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    posts::{
        dto::{CreatePostRequest, FeedPage, Pagination},
        repo_types::Post,
        services,
    },
    state::AppState,
};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/timeline", get(timeline))
        .route("/explore", get(explore))
        .route("/users/:username/posts", get(user_posts))
}

#[instrument(skip(state, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let post = services::create_post(state.store.as_ref(), user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip(state))]
pub async fn timeline(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<FeedPage>, AppError> {
    Ok(Json(
        services::timeline(state.store.as_ref(), user_id, p.into()).await?,
    ))
}

#[instrument(skip(state))]
pub async fn explore(
    State(state): State<AppState>,
    _caller: AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<FeedPage>, AppError> {
    Ok(Json(services::explore(state.store.as_ref(), p.into()).await?))
}

#[instrument(skip(state))]
pub async fn user_posts(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(username): Path<String>,
    Query(p): Query<Pagination>,
) -> Result<Json<FeedPage>, AppError> {
    Ok(Json(
        services::posts_of(state.store.as_ref(), &username, p.into()).await?,
    ))
}
