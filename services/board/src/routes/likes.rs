//! Like routes

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;

use super::parse_id;
use crate::{
    error::{ApiError, ApiResult},
    middleware::CurrentSession,
    state::AppState,
};

/// `POST /api/posts/:postId/like`
pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(post_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let post_id = parse_id(&post_id, "Post")?;

    if !state.post_repository.exists(post_id).await? {
        return Err(ApiError::NotFound("Post not found".to_string()));
    }

    let toggle = state
        .like_repository
        .toggle(post_id, session.user.id)
        .await?;

    state.post_cache.invalidate_all().await;
    info!(post_id, user_id = session.user.id, liked = toggle.liked(), "Toggled like");

    Ok(Json(json!({
        "message": toggle.message(),
        "liked": toggle.liked(),
    })))
}

/// `GET /api/posts/:postId/likes`
pub async fn like_count(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let post_id = parse_id(&post_id, "Post")?;
    let likes = state.like_repository.count(post_id).await?;
    Ok(Json(json!({ "likes": likes })))
}

/// `GET /api/posts/:postId/like-status`
pub async fn like_status(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(post_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let post_id = parse_id(&post_id, "Post")?;
    let liked = state
        .like_repository
        .is_liked(post_id, session.user.id)
        .await?;
    Ok(Json(json!({ "liked": liked })))
}
