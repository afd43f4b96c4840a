//! User repository for database operations

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use sqlx::PgPool;
use tracing::info;

use crate::models::{NewUser, User};

/// Hash a plain-text password into an argon2 PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(hash)
}

/// Check a plain-text password against a stored PHC string
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user and return its id
    pub async fn create(&self, new_user: &NewUser) -> Result<i64> {
        let user_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (email, password, username, image)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.username)
        .bind(&new_user.image)
        .fetch_one(&self.pool)
        .await?;

        info!(user_id, "Created user");
        Ok(user_id)
    }

    /// Whether an account already uses this email
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, email, password, username, image
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, email, password, username, image
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Update username and/or profile image, returning the updated row
    ///
    /// `None` keeps the stored value. Returns `None` when the user does not exist.
    pub async fn update_profile(
        &self,
        id: i64,
        username: Option<&str>,
        image: Option<&str>,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = COALESCE($1, username),
                image = COALESCE($2, image)
            WHERE user_id = $3
            RETURNING user_id, email, password, username, image
            "#,
        )
        .bind(username)
        .bind(image)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Replace the stored password hash. Returns false when the user is gone.
    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password = $1 WHERE user_id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the user's posts, then the user, in one transaction
    ///
    /// Returns the image names that belonged to the deleted rows so the
    /// caller can remove the files, or `None` when the user does not exist.
    pub async fn delete_with_posts(&self, id: i64) -> Result<Option<DeletedUserImages>> {
        let mut tx = self.pool.begin().await?;

        let post_images: Vec<Option<String>> =
            sqlx::query_scalar("DELETE FROM posts WHERE user_id = $1 RETURNING image")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        let profile_image: Option<Option<String>> =
            sqlx::query_scalar("DELETE FROM users WHERE user_id = $1 RETURNING image")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(profile_image) = profile_image else {
            tx.rollback().await?;
            return Ok(None);
        };

        tx.commit().await?;
        info!(user_id = id, posts = post_images.len(), "Deleted user");

        Ok(Some(DeletedUserImages {
            profile_image,
            post_images: post_images.into_iter().flatten().collect(),
        }))
    }
}

/// Stored images orphaned by an account deletion
#[derive(Debug, Default)]
pub struct DeletedUserImages {
    pub profile_image: Option<String>,
    pub post_images: Vec<String>,
}
