//! Post routes

use axum::{
    Extension, Json,
    extract::{ConnectInfo, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use std::net::SocketAddr;
use tracing::{info, warn};

use super::parse_id;
use crate::{
    error::{ApiError, ApiResult},
    middleware::CurrentSession,
    models::{NewPost, PostChanges},
    state::AppState,
    storage::ImageKind,
    upload::ImageForm,
    views::Viewer,
};

/// `POST /api/posts`
pub async fn create_post(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut form =
        ImageForm::parse(multipart, "postImage", state.config.upload.max_file_bytes).await?;

    let (Some(title), Some(content)) = (
        form.text("title").map(str::to_string),
        form.text("content").map(str::to_string),
    ) else {
        return Err(ApiError::BadRequest(
            "Title and content are required".to_string(),
        ));
    };

    let image = form.store_file(&state.storage, ImageKind::Post).await?;

    let new_post = NewPost {
        user_id: session.user.id,
        title,
        content,
        image,
    };

    let post_id = match state.post_repository.create(&new_post).await {
        Ok(post_id) => post_id,
        Err(e) => {
            if let Some(image) = &new_post.image {
                state.storage.delete(ImageKind::Post, image).await;
            }
            return Err(e.into());
        }
    };

    state.post_cache.invalidate_all().await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Post created",
            "postId": post_id,
        })),
    ))
}

/// `GET /api/posts`
pub async fn list_posts(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let posts = state
        .post_cache
        .list_posts(&state.post_repository)
        .await?;
    Ok(Json(posts))
}

/// `GET /api/posts/:postId`
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let post_id = parse_id(&post_id, "Post")?;

    let post = state
        .post_cache
        .post_detail(&state.post_repository, post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    Ok(Json(post))
}

/// `PUT /api/posts/:postId`
pub async fn update_post(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(post_id): Path<String>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let post_id = parse_id(&post_id, "Post")?;
    let mut form =
        ImageForm::parse(multipart, "postImage", state.config.upload.max_file_bytes).await?;

    let mut changes = PostChanges {
        title: form.text("title").map(str::to_string),
        content: form.text("content").map(str::to_string),
        image: None,
    };
    if changes.is_empty() && form.file.is_none() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }

    let owner = state.post_repository.find_owner(post_id).await?;
    let Some(owner) = owner.filter(|owner| owner.user_id == session.user.id) else {
        return Err(ApiError::Forbidden(
            "You can only edit your own posts".to_string(),
        ));
    };

    changes.image = form.store_file(&state.storage, ImageKind::Post).await?;

    if !state.post_repository.update(post_id, &changes).await? {
        if let Some(image) = &changes.image {
            state.storage.delete(ImageKind::Post, image).await;
        }
        return Err(ApiError::NotFound("Post not found".to_string()));
    }

    if changes.image.is_some() {
        if let Some(old_image) = &owner.image {
            state.storage.delete(ImageKind::Post, old_image).await;
        }
    }

    state.post_cache.invalidate_all().await;
    info!(post_id, "Updated post");

    Ok(Json(json!({ "message": "Post updated" })))
}

/// `DELETE /api/posts/:postId`
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(post_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let post_id = parse_id(&post_id, "Post")?;
    let not_permitted = || ApiError::NotFound("Post not found or not permitted".to_string());

    let owner = state
        .post_repository
        .find_owner(post_id)
        .await?
        .filter(|owner| owner.user_id == session.user.id)
        .ok_or_else(not_permitted)?;

    if !state.post_repository.delete(owner.post_id).await? {
        return Err(not_permitted());
    }

    if let Some(image) = &owner.image {
        state.storage.delete(ImageKind::Post, image).await;
    }

    state.post_cache.invalidate_all().await;
    info!(post_id, "Deleted post");

    Ok(Json(json!({ "message": "Post deleted" })))
}

/// `PATCH /api/posts/:postId/views`
pub async fn record_view(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
    Path(post_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let post_id = parse_id(&post_id, "Post")?;

    let session_user = match state.sessions.load_from_jar(&jar).await {
        Ok(session) => session.map(|(_, user)| user),
        Err(e) => {
            warn!("Session lookup failed, counting view by address: {:#}", e);
            None
        }
    };
    let viewer = Viewer::identify(
        session_user.as_ref(),
        &headers,
        peer,
        state.config.server.trust_forwarded_for,
    );

    let Some(current_views) = state.post_repository.views(post_id).await? else {
        return Err(ApiError::NotFound("Post not found".to_string()));
    };

    if !state.view_tracker.first_view(post_id, &viewer).await? {
        return Ok(Json(json!({ "views": current_views, "counted": false })));
    }

    let views = state
        .post_repository
        .increment_views(post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    state.post_cache.invalidate_post(post_id).await;

    Ok(Json(json!({ "views": views, "counted": true })))
}
