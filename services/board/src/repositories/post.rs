//! Post repository for database operations

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::models::{NewPost, PostChanges, PostDetail, PostOwner, PostSummary};

/// Post repository
#[derive(Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    /// Create a new post repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a post and return its id
    pub async fn create(&self, post: &NewPost) -> Result<i64> {
        let post_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO posts (user_id, title, content, image)
            VALUES ($1, $2, $3, $4)
            RETURNING post_id
            "#,
        )
        .bind(post.user_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.image)
        .fetch_one(&self.pool)
        .await?;

        info!(post_id, user_id = post.user_id, "Created post");
        Ok(post_id)
    }

    /// All posts, newest first, with author and counters
    pub async fn list(&self) -> Result<Vec<PostSummary>> {
        let posts = sqlx::query_as::<_, PostSummary>(
            r#"
            SELECT
                p.post_id AS id,
                p.title,
                p.content,
                p.image,
                p.views,
                p.created_at,
                u.username AS author,
                u.image AS author_image,
                (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.post_id) AS comment_count,
                (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.post_id) AS like_count
            FROM posts p
            INNER JOIN users u ON p.user_id = u.user_id
            ORDER BY p.created_at DESC, p.post_id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(posts)
    }

    /// A single post with its author
    pub async fn find_detail(&self, id: i64) -> Result<Option<PostDetail>> {
        let post = sqlx::query_as::<_, PostDetail>(
            r#"
            SELECT
                p.post_id AS id,
                p.user_id AS author_id,
                p.title,
                p.content,
                p.image,
                p.views,
                p.created_at,
                p.updated_at,
                u.username AS author,
                u.image AS author_image
            FROM posts p
            INNER JOIN users u ON p.user_id = u.user_id
            WHERE p.post_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(post)
    }

    /// Owner and image of a post
    pub async fn find_owner(&self, id: i64) -> Result<Option<PostOwner>> {
        let owner = sqlx::query_as::<_, PostOwner>(
            "SELECT post_id, user_id, image FROM posts WHERE post_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner)
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE post_id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Apply a partial update and bump `updated_at`
    pub async fn update(&self, id: i64, changes: &PostChanges) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET title = COALESCE($1, title),
                content = COALESCE($2, content),
                image = COALESCE($3, image),
                updated_at = NOW()
            WHERE post_id = $4
            "#,
        )
        .bind(&changes.title)
        .bind(&changes.content)
        .bind(&changes.image)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a post; comments and likes go with it
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE post_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Current view count, `None` when the post does not exist
    pub async fn views(&self, id: i64) -> Result<Option<i64>> {
        let views: Option<i64> = sqlx::query_scalar("SELECT views FROM posts WHERE post_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(views)
    }

    /// Increment and return the view count, `None` when the post does not exist
    pub async fn increment_views(&self, id: i64) -> Result<Option<i64>> {
        let views: Option<i64> = sqlx::query_scalar(
            "UPDATE posts SET views = views + 1 WHERE post_id = $1 RETURNING views",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(views)
    }
}
