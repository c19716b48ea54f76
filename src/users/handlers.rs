use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::jwt::AuthUser,
    error::AppError,
    state::AppState,
    users::{
        dto::{EditProfileRequest, MeResponse, ProfileResponse, PublicUser},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me).put(edit_me))
        .route("/users/:username", get(get_profile))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MeResponse>, AppError> {
    Ok(Json(services::me(state.store.as_ref(), user_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn edit_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<EditProfileRequest>,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(
        services::edit_profile(state.store.as_ref(), user_id, payload).await?,
    ))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(viewer_id): AuthUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(
        services::profile(state.store.as_ref(), viewer_id, &username).await?,
    ))
}
