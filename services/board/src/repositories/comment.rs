//! Comment repository for database operations

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::info;

use crate::models::{Comment, CommentOwner};

/// Comment repository
#[derive(Clone)]
pub struct CommentRepository {
    pool: PgPool,
}

impl CommentRepository {
    /// Create a new comment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Comments of a post, newest first
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.comment_id, c.content, c.created_at, u.username AS author
            FROM comments c
            JOIN users u ON c.user_id = u.user_id
            WHERE c.post_id = $1
            ORDER BY c.created_at DESC, c.comment_id DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(comments)
    }

    /// Insert a comment, returning its id and creation time
    pub async fn create(
        &self,
        post_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<(i64, DateTime<Utc>)> {
        let row = sqlx::query(
            r#"
            INSERT INTO comments (post_id, user_id, content)
            VALUES ($1, $2, $3)
            RETURNING comment_id, created_at
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        let comment_id: i64 = row.get("comment_id");
        info!(comment_id, post_id, user_id, "Created comment");
        Ok((comment_id, row.get("created_at")))
    }

    pub async fn find_owner(&self, comment_id: i64) -> Result<Option<CommentOwner>> {
        let owner = sqlx::query_as::<_, CommentOwner>(
            "SELECT comment_id, post_id, user_id FROM comments WHERE comment_id = $1",
        )
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner)
    }

    pub async fn update(&self, comment_id: i64, content: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE comments SET content = $1, updated_at = NOW() WHERE comment_id = $2",
        )
        .bind(content)
        .bind(comment_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, comment_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE comment_id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
