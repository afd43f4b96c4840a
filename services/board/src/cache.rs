//! Read-through cache for post listings and post details
//!
//! Entries are plain JSON under `posts:list` and `posts:<id>` with fixed
//! TTLs. Redis trouble never fails a read: lookups fall back to the
//! database and write-backs are best effort.

use anyhow::Result;
use common::cache::RedisPool;
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::metrics::Metrics;
use crate::models::{PostDetail, PostSummary};
use crate::repositories::PostRepository;
use crate::session::SESSION_KEY_PREFIX;

/// Key of the cached post listing
pub const POST_LIST_KEY: &str = "posts:list";

/// Key of one cached post
pub fn post_key(post_id: i64) -> String {
    format!("posts:{}", post_id)
}

/// Post cache backed by Redis
#[derive(Clone)]
pub struct PostCache {
    redis_pool: RedisPool,
    config: CacheConfig,
    metrics: Metrics,
}

impl PostCache {
    pub fn new(redis_pool: RedisPool, config: CacheConfig, metrics: Metrics) -> Self {
        Self {
            redis_pool,
            config,
            metrics,
        }
    }

    /// Cached value of `key`, or the loader's value stored with `ttl_seconds`
    ///
    /// A loader returning `None` is passed through without being cached.
    pub async fn get_or_load<T, F, Fut>(
        &self,
        key: &str,
        ttl_seconds: u64,
        label: &str,
        loader: F,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        match self.redis_pool.get(key).await {
            Ok(Some(cached)) => match serde_json::from_str::<T>(&cached) {
                Ok(value) => {
                    debug!(key, "Cache hit");
                    self.metrics.record_cache_lookup(label, true);
                    return Ok(Some(value));
                }
                Err(e) => warn!(key, "Discarding unreadable cache entry: {}", e),
            },
            Ok(None) => {}
            Err(e) => warn!(key, "Cache read failed, using database: {}", e),
        }

        self.metrics.record_cache_lookup(label, false);
        let Some(value) = loader().await? else {
            return Ok(None);
        };

        match serde_json::to_string(&value) {
            Ok(json) => {
                if let Err(e) = self.redis_pool.set(key, &json, Some(ttl_seconds)).await {
                    warn!(key, "Cache write failed: {}", e);
                }
            }
            Err(e) => warn!(key, "Failed to serialize cache entry: {}", e),
        }

        Ok(Some(value))
    }

    /// Post listing through `posts:list`
    pub async fn list_posts(&self, posts: &PostRepository) -> Result<Vec<PostSummary>> {
        let listing = self
            .get_or_load(
                POST_LIST_KEY,
                self.config.post_list_ttl_seconds,
                "list",
                || async { posts.list().await.map(Some) },
            )
            .await?;
        Ok(listing.unwrap_or_default())
    }

    /// One post through `posts:<id>`
    pub async fn post_detail(
        &self,
        posts: &PostRepository,
        post_id: i64,
    ) -> Result<Option<PostDetail>> {
        self.get_or_load(
            &post_key(post_id),
            self.config.post_detail_ttl_seconds,
            "detail",
            || posts.find_detail(post_id),
        )
        .await
    }

    /// Drop every cached entry except view markers and sessions
    pub async fn invalidate_all(&self) {
        match self
            .redis_pool
            .delete_non_view_keys(&[SESSION_KEY_PREFIX])
            .await
        {
            Ok(deleted) => info!(deleted, "Invalidated post cache"),
            Err(e) => warn!("Cache invalidation failed: {}", e),
        }
    }

    /// Drop the listing and one post after its view count changed
    pub async fn invalidate_post(&self, post_id: i64) {
        let keys = [POST_LIST_KEY.to_string(), post_key(post_id)];
        if let Err(e) = self.redis_pool.delete_many(&keys).await {
            warn!(post_id, "Cache invalidation failed: {}", e);
        }
    }
}
