//! Comment model and related payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Comment as listed under a post
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub comment_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
}

/// Ownership facts needed before mutating a comment
#[derive(Debug, Clone, FromRow)]
pub struct CommentOwner {
    pub comment_id: i64,
    pub post_id: i64,
    pub user_id: i64,
}

/// Body of comment create and edit requests
#[derive(Debug, Clone, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: String,
}
