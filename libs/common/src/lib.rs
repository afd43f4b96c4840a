//! Common library for the board backend
//!
//! This crate provides the shared infrastructure used by the board service:
//! PostgreSQL connectivity, the Redis pool behind sessions and the post
//! cache, and the matching error types.

pub mod cache;
pub mod database;
pub mod error;

/// Example usage of the database and cache modules
///
/// ```rust,no_run
/// use common::cache::{RedisConfig, RedisPool};
/// use common::database::{DatabaseConfig, health_check, init_pool};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = init_pool(&DatabaseConfig::from_env()?).await?;
///     let redis = RedisPool::new(&RedisConfig::from_env()?).await?;
///     println!("database: {}", health_check(&pool).await?);
///     println!("redis: {}", redis.health_check().await?);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
