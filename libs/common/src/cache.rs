//! Redis cache module for the board service
//!
//! This module provides functionality for connecting to Redis and performing
//! the cache operations the service relies on: get and set with TTL support,
//! conditional sets for deduplication markers, and cursor-based key sweeps
//! used to invalidate cached listings.

use crate::error::{CacheError, CacheResult};
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

/// Prefix of the view deduplication markers. Invalidation never touches them.
pub const VIEW_KEY_PREFIX: &str = "view:";

/// Number of keys requested per SCAN round trip
const SCAN_BATCH: usize = 200;

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    pub fn from_env() -> CacheResult<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        Ok(RedisConfig { url })
    }
}

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Initialize a new Redis connection pool
    pub async fn new(config: &RedisConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.clone()).map_err(CacheError::Connection)?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool { client })
    }

    /// Get a connection from the pool
    async fn get_connection(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(CacheError::Connection)
    }

    /// Set a key-value pair in Redis with optional TTL
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;

        if let Some(ttl) = ttl_seconds {
            let _: () = conn
                .set_ex(key, value, ttl)
                .await
                .map_err(CacheError::Command)?;
        } else {
            let _: () = conn.set(key, value).await.map_err(CacheError::Command)?;
        }

        Ok(())
    }

    /// Set a key only if it does not exist yet, with a TTL
    ///
    /// Returns `true` when the key was created by this call.
    pub async fn set_if_absent(&self, key: &str, value: &str, ttl_seconds: u64) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(CacheError::Command)?;

        Ok(reply.is_some())
    }

    /// Get a value from Redis by key
    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await.map_err(CacheError::Command)?;
        Ok(value)
    }

    /// Delete a key from Redis
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.get_connection().await?;
        let _: u64 = conn.del(key).await.map_err(CacheError::Command)?;
        Ok(())
    }

    /// Delete several keys in one round trip, returning how many existed
    pub async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_connection().await?;
        let removed: u64 = conn.del(keys.to_vec()).await.map_err(CacheError::Command)?;
        Ok(removed)
    }

    /// Collect every key matching a glob pattern with SCAN
    pub async fn scan_keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.get_connection().await?;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(CacheError::Command)?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    /// Delete every key except view markers and keys under `protected_prefixes`
    ///
    /// Returns the number of deleted keys.
    pub async fn delete_non_view_keys(&self, protected_prefixes: &[&str]) -> CacheResult<u64> {
        let doomed: Vec<String> = self
            .scan_keys("*")
            .await?
            .into_iter()
            .filter(|key| !is_protected_key(key, protected_prefixes))
            .collect();

        if doomed.is_empty() {
            debug!("No cache keys to delete");
            return Ok(0);
        }

        let removed = self.delete_many(&doomed).await?;
        debug!(count = removed, "Deleted cache keys");
        Ok(removed)
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> CacheResult<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(CacheError::Command)?;
        Ok(pong == "PONG")
    }
}

/// Whether a key survives an invalidation sweep
pub fn is_protected_key(key: &str, protected_prefixes: &[&str]) -> bool {
    key.starts_with(VIEW_KEY_PREFIX)
        || protected_prefixes
            .iter()
            .any(|prefix| key.starts_with(prefix))
}
