use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    follows::{
        dto::{FollowResponse, IdSetResponse},
        services,
    },
    state::AppState,
    users::services::find_by_username,
};

pub fn follow_routes() -> Router<AppState> {
    Router::new()
        .route("/follow/:username", post(follow))
        .route("/unfollow/:username", post(unfollow))
        .route("/users/:username/followers", get(followers))
        .route("/users/:username/following", get(following))
}

#[instrument(skip(state))]
pub async fn follow(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(username): Path<String>,
) -> Result<Json<FollowResponse>, AppError> {
    Ok(Json(
        services::follow_username(state.store.as_ref(), user_id, &username).await?,
    ))
}

#[instrument(skip(state))]
pub async fn unfollow(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(username): Path<String>,
) -> Result<Json<FollowResponse>, AppError> {
    Ok(Json(
        services::unfollow_username(state.store.as_ref(), user_id, &username).await?,
    ))
}

#[instrument(skip(state))]
pub async fn followers(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(username): Path<String>,
) -> Result<Json<IdSetResponse>, AppError> {
    let user = find_by_username(state.store.as_ref(), &username).await?;
    let ids = services::followers_of(state.store.as_ref(), user.id).await?;
    Ok(Json(IdSetResponse { user_id: user.id, ids }))
}

#[instrument(skip(state))]
pub async fn following(
    State(state): State<AppState>,
    _caller: AuthUser,
    Path(username): Path<String>,
) -> Result<Json<IdSetResponse>, AppError> {
    let user = find_by_username(state.store.as_ref(), &username).await?;
    let ids = services::followed_ids(state.store.as_ref(), user.id).await?;
    Ok(Json(IdSetResponse { user_id: user.id, ids }))
}
