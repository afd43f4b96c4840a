//! Deduplicated post view counting

use anyhow::{Context, Result};
use axum::http::HeaderMap;
use common::cache::{RedisPool, VIEW_KEY_PREFIX};
use std::net::SocketAddr;

use crate::models::SessionUser;

/// Who is looking at a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    User(i64),
    Address(String),
}

impl Viewer {
    /// Logged-in user if any, otherwise the client address
    ///
    /// With `trust_forwarded_for` the first `X-Forwarded-For` entry wins
    /// over the socket address. Clients can write that header themselves,
    /// so it is only honoured when a proxy in front rewrites it.
    pub fn identify(
        user: Option<&SessionUser>,
        headers: &HeaderMap,
        peer: SocketAddr,
        trust_forwarded_for: bool,
    ) -> Self {
        if let Some(user) = user {
            return Viewer::User(user.id);
        }

        let forwarded = trust_forwarded_for
            .then(|| headers.get("x-forwarded-for"))
            .flatten()
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match forwarded {
            Some(address) => Viewer::Address(address.to_string()),
            None => Viewer::Address(peer.ip().to_string()),
        }
    }

    fn marker(&self) -> String {
        match self {
            Viewer::User(id) => format!("user:{}", id),
            Viewer::Address(address) => format!("ip:{}", address),
        }
    }
}

/// Key remembering that `viewer` already saw `post_id`
pub fn view_key(post_id: i64, viewer: &Viewer) -> String {
    format!("{}{}:{}", VIEW_KEY_PREFIX, post_id, viewer.marker())
}

/// Remembers recent viewers in Redis
#[derive(Clone)]
pub struct ViewTracker {
    redis_pool: RedisPool,
    window_seconds: u64,
}

impl ViewTracker {
    pub fn new(redis_pool: RedisPool, window_seconds: u64) -> Self {
        Self {
            redis_pool,
            window_seconds,
        }
    }

    /// `true` when this is the viewer's first view within the window
    pub async fn first_view(&self, post_id: i64, viewer: &Viewer) -> Result<bool> {
        self.redis_pool
            .set_if_absent(&view_key(post_id, viewer), "1", self.window_seconds)
            .await
            .context("Failed to record view marker")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "10.1.2.3:55000".parse().unwrap()
    }

    fn user() -> SessionUser {
        SessionUser {
            id: 12,
            email: "kim@example.com".to_string(),
            username: "kim".to_string(),
            image: None,
        }
    }

    #[test]
    fn test_session_user_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        assert_eq!(
            Viewer::identify(Some(&user()), &headers, peer(), true),
            Viewer::User(12)
        );
    }

    #[test]
    fn test_first_forwarded_address_is_used() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.9 , 10.0.0.1"),
        );
        assert_eq!(
            Viewer::identify(None, &headers, peer(), true),
            Viewer::Address("203.0.113.9".to_string())
        );
    }

    #[test]
    fn test_forwarded_header_ignored_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        assert_eq!(
            Viewer::identify(None, &headers, peer(), false),
            Viewer::Address("10.1.2.3".to_string())
        );
    }

    #[test]
    fn test_socket_address_fallback() {
        assert_eq!(
            Viewer::identify(None, &HeaderMap::new(), peer(), true),
            Viewer::Address("10.1.2.3".to_string())
        );
    }

    #[test]
    fn test_view_keys() {
        assert_eq!(view_key(5, &Viewer::User(12)), "view:5:user:12");
        assert_eq!(
            view_key(5, &Viewer::Address("10.1.2.3".to_string())),
            "view:5:ip:10.1.2.3"
        );
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_second_view_is_not_counted() -> Result<()> {
        let redis_pool = RedisPool::new(&common::cache::RedisConfig {
            url: "redis://localhost:6379".to_string(),
        })
        .await?;
        let tracker = ViewTracker::new(redis_pool.clone(), 60);
        let viewer = Viewer::Address(uuid::Uuid::new_v4().to_string());

        assert!(tracker.first_view(1, &viewer).await?);
        assert!(!tracker.first_view(1, &viewer).await?);

        redis_pool.delete(&view_key(1, &viewer)).await?;
        Ok(())
    }
}
