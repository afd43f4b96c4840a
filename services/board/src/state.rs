//! Application state shared across handlers

use common::cache::RedisPool;
use sqlx::PgPool;

use crate::{
    cache::PostCache,
    config::AppConfig,
    metrics::Metrics,
    rate_limiter::RateLimiter,
    repositories::{CommentRepository, LikeRepository, PostRepository, UserRepository},
    session::SessionManager,
    storage::ImageStorage,
    views::ViewTracker,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub redis_pool: RedisPool,
    pub config: AppConfig,
    pub user_repository: UserRepository,
    pub post_repository: PostRepository,
    pub comment_repository: CommentRepository,
    pub like_repository: LikeRepository,
    pub sessions: SessionManager,
    pub post_cache: PostCache,
    pub view_tracker: ViewTracker,
    pub storage: ImageStorage,
    pub rate_limiter: RateLimiter,
    pub metrics: Metrics,
}

impl AppState {
    /// Wire every component from the shared connections
    pub fn new(
        db_pool: PgPool,
        redis_pool: RedisPool,
        config: AppConfig,
        storage: ImageStorage,
        metrics: Metrics,
    ) -> Self {
        Self {
            user_repository: UserRepository::new(db_pool.clone()),
            post_repository: PostRepository::new(db_pool.clone()),
            comment_repository: CommentRepository::new(db_pool.clone()),
            like_repository: LikeRepository::new(db_pool.clone()),
            sessions: SessionManager::new(redis_pool.clone(), config.session.clone()),
            post_cache: PostCache::new(redis_pool.clone(), config.cache.clone(), metrics.clone()),
            view_tracker: ViewTracker::new(redis_pool.clone(), config.cache.view_window_seconds),
            rate_limiter: RateLimiter::new((&config.login).into()),
            db_pool,
            redis_pool,
            config,
            storage,
            metrics,
        }
    }
}
