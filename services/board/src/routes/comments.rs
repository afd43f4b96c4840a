//! Comment routes

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;

use super::parse_id;
use crate::{
    error::{ApiError, ApiResult},
    middleware::CurrentSession,
    models::{CommentOwner, CommentRequest},
    state::AppState,
};

fn required_content(payload: &CommentRequest) -> ApiResult<&str> {
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment content is required".to_string()));
    }
    Ok(content)
}

/// Load a comment and make sure the session user wrote it
async fn owned_comment(
    state: &AppState,
    comment_id: i64,
    user_id: i64,
) -> ApiResult<CommentOwner> {
    let owner = state
        .comment_repository
        .find_owner(comment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    if owner.user_id != user_id {
        return Err(ApiError::Forbidden(
            "You can only change your own comments".to_string(),
        ));
    }
    Ok(owner)
}

/// `GET /api/posts/:postId/comments`
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let post_id = parse_id(&post_id, "Post")?;
    let comments = state.comment_repository.list_for_post(post_id).await?;
    Ok(Json(comments))
}

/// `POST /api/posts/:postId/comments`
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(post_id): Path<String>,
    Json(payload): Json<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let post_id = parse_id(&post_id, "Post")?;
    let content = required_content(&payload)?;

    if !state.post_repository.exists(post_id).await? {
        return Err(ApiError::NotFound("Post not found".to_string()));
    }

    let (comment_id, created_at) = state
        .comment_repository
        .create(post_id, session.user.id, content)
        .await?;

    state.post_cache.invalidate_all().await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Comment created",
            "commentId": comment_id,
            "author": session.user.username,
            "content": content,
            "created_at": created_at,
        })),
    ))
}

/// `PUT /api/comments/:commentId`
pub async fn update_comment(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(comment_id): Path<String>,
    Json(payload): Json<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let comment_id = parse_id(&comment_id, "Comment")?;
    let content = required_content(&payload)?;

    let owner = owned_comment(&state, comment_id, session.user.id).await?;

    if !state.comment_repository.update(owner.comment_id, content).await? {
        return Err(ApiError::NotFound("Comment not found".to_string()));
    }

    state.post_cache.invalidate_all().await;
    info!(comment_id, post_id = owner.post_id, "Updated comment");

    Ok(Json(json!({ "message": "Comment updated" })))
}

/// `DELETE /api/comments/:commentId`
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Path(comment_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let comment_id = parse_id(&comment_id, "Comment")?;

    let owner = owned_comment(&state, comment_id, session.user.id).await?;

    if !state.comment_repository.delete(owner.comment_id).await? {
        return Err(ApiError::NotFound("Comment not found".to_string()));
    }

    state.post_cache.invalidate_all().await;
    info!(comment_id, post_id = owner.post_id, "Deleted comment");

    Ok(Json(json!({ "message": "Comment deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_content_trims() {
        let payload = CommentRequest {
            content: "  nice post \n".to_string(),
        };
        assert_eq!(required_content(&payload).unwrap(), "nice post");
    }

    #[test]
    fn test_blank_content_is_rejected() {
        let payload = CommentRequest {
            content: " \t ".to_string(),
        };
        assert!(matches!(
            required_content(&payload),
            Err(ApiError::BadRequest(_))
        ));
    }
}
