//! Session management using Redis
//!
//! A session is an opaque random id stored in an HttpOnly cookie. The
//! server keeps the logged-in user under `session:<id>` with a TTL, plus
//! an index key `session:user:<user id>:<id>` so that every session of a
//! user can be found and revoked.

use anyhow::{Context, Result};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use common::cache::RedisPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::models::SessionUser;

/// Redis key prefix of stored sessions
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Session manager for handling user sessions in Redis
#[derive(Clone)]
pub struct SessionManager {
    redis_pool: RedisPool,
    config: SessionConfig,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(redis_pool: RedisPool, config: SessionConfig) -> Self {
        Self { redis_pool, config }
    }

    fn session_key(sid: &str) -> String {
        format!("{}{}", SESSION_KEY_PREFIX, sid)
    }

    fn user_index_prefix(user_id: i64) -> String {
        format!("{}user:{}:", SESSION_KEY_PREFIX, user_id)
    }

    fn user_index_key(user_id: i64, sid: &str) -> String {
        format!("{}{}", Self::user_index_prefix(user_id), sid)
    }

    /// Create a new session for a user and return its id
    pub async fn create(&self, user: &SessionUser) -> Result<String> {
        let sid = Uuid::new_v4().simple().to_string();
        self.store(&sid, user).await?;
        info!(user_id = user.id, "Created session");
        Ok(sid)
    }

    /// Replace the user snapshot of an existing session and refresh its TTL
    pub async fn update(&self, sid: &str, user: &SessionUser) -> Result<()> {
        self.store(sid, user).await
    }

    async fn store(&self, sid: &str, user: &SessionUser) -> Result<()> {
        let value = serde_json::to_string(user)?;
        let ttl = Some(self.config.ttl_seconds);
        self.redis_pool
            .set(&Self::session_key(sid), &value, ttl)
            .await
            .context("Failed to store session")?;
        self.redis_pool
            .set(&Self::user_index_key(user.id, sid), "1", ttl)
            .await
            .context("Failed to index session")?;
        Ok(())
    }

    /// Load the user of a session, `None` when it expired or never existed
    pub async fn load(&self, sid: &str) -> Result<Option<SessionUser>> {
        if !is_well_formed_sid(sid) {
            debug!("Ignoring malformed session cookie");
            return Ok(None);
        }

        let value = self
            .redis_pool
            .get(&Self::session_key(sid))
            .await
            .context("Failed to read session")?;

        match value {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    /// Load the session referenced by the request cookie, if any
    pub async fn load_from_jar(&self, jar: &CookieJar) -> Result<Option<(String, SessionUser)>> {
        let Some(sid) = self.sid_from_jar(jar) else {
            return Ok(None);
        };

        Ok(self.load(&sid).await?.map(|user| (sid, user)))
    }

    /// Session id carried by the request cookie
    pub fn sid_from_jar(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.config.cookie_name)
            .map(|cookie| cookie.value().to_string())
    }

    /// Delete a session
    pub async fn destroy(&self, sid: &str) -> Result<()> {
        let Some(user) = self.load(sid).await? else {
            return Ok(());
        };

        self.redis_pool
            .delete_many(&[Self::session_key(sid), Self::user_index_key(user.id, sid)])
            .await
            .context("Failed to delete session")?;
        info!(user_id = user.id, "Destroyed session");
        Ok(())
    }

    /// Delete every session of a user except `keep`
    ///
    /// Returns how many sessions were revoked.
    pub async fn revoke_user_sessions(&self, user_id: i64, keep: Option<&str>) -> Result<usize> {
        let prefix = Self::user_index_prefix(user_id);
        let index_keys = self
            .redis_pool
            .scan_keys(&format!("{}*", prefix))
            .await
            .context("Failed to list user sessions")?;

        let doomed = revoked_keys(&prefix, index_keys, keep);
        if doomed.is_empty() {
            return Ok(0);
        }

        self.redis_pool
            .delete_many(&doomed)
            .await
            .context("Failed to revoke user sessions")?;

        let revoked = doomed.len() / 2;
        info!(user_id, revoked, "Revoked user sessions");
        Ok(revoked)
    }

    /// Cookie that hands the session id to the browser
    pub fn session_cookie(&self, sid: String) -> Cookie<'static> {
        Cookie::build((self.config.cookie_name.clone(), sid))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.config.secure)
            .max_age(cookie::time::Duration::seconds(
                i64::try_from(self.config.ttl_seconds).unwrap_or(i64::MAX),
            ))
            .build()
    }

    /// Cookie that makes the browser forget the session id
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.config.cookie_name.clone(), "")).path("/").build()
    }
}

/// Session and index keys to delete for the indexed sessions not in `keep`
fn revoked_keys(prefix: &str, index_keys: Vec<String>, keep: Option<&str>) -> Vec<String> {
    let mut doomed = Vec::with_capacity(index_keys.len() * 2);
    for index_key in index_keys {
        let Some(sid) = index_key.strip_prefix(prefix) else {
            continue;
        };
        if !is_well_formed_sid(sid) || keep == Some(sid) {
            continue;
        }
        doomed.push(SessionManager::session_key(sid));
        doomed.push(index_key);
    }
    doomed
}

/// Session ids are 32 lowercase hex characters
fn is_well_formed_sid(sid: &str) -> bool {
    sid.len() == 32 && sid.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::cache::RedisConfig;

    async fn manager() -> SessionManager {
        let redis_pool = RedisPool::new(&RedisConfig {
            url: "redis://localhost:6379".to_string(),
        })
        .await
        .unwrap();

        SessionManager::new(
            redis_pool,
            SessionConfig {
                cookie_name: "board.sid".to_string(),
                ttl_seconds: 600,
                secure: true,
            },
        )
    }

    #[test]
    fn test_sid_shape() {
        let sid = Uuid::new_v4().simple().to_string();
        assert!(is_well_formed_sid(&sid));
        assert!(!is_well_formed_sid("../../etc"));
        assert!(!is_well_formed_sid(&sid.to_uppercase()));
        assert!(!is_well_formed_sid(""));
    }

    #[test]
    fn test_user_index_keys_never_look_like_sessions() {
        let sid = Uuid::new_v4().simple().to_string();
        let index_key = SessionManager::user_index_key(7, &sid);
        assert_eq!(index_key, format!("session:user:7:{}", sid));
        // load() only accepts bare ids, so the index is never read as a session
        assert!(!is_well_formed_sid(index_key.trim_start_matches(SESSION_KEY_PREFIX)));
    }

    #[test]
    fn test_revoked_keys_skip_the_kept_session() {
        let current = "a".repeat(32);
        let other = "b".repeat(32);
        let prefix = SessionManager::user_index_prefix(7);

        let doomed = revoked_keys(
            &prefix,
            vec![
                SessionManager::user_index_key(7, &current),
                SessionManager::user_index_key(7, &other),
                format!("{}garbage", prefix),
            ],
            Some(&current),
        );

        assert_eq!(
            doomed,
            vec![
                format!("session:{}", other),
                format!("session:user:7:{}", other),
            ]
        );
    }

    #[test]
    fn test_revoked_keys_without_keep_takes_all() {
        let prefix = SessionManager::user_index_prefix(3);
        let sids = ["c".repeat(32), "d".repeat(32)];
        let doomed = revoked_keys(
            &prefix,
            sids.iter()
                .map(|sid| SessionManager::user_index_key(3, sid))
                .collect(),
            None,
        );
        assert_eq!(doomed.len(), 4);
    }

    #[tokio::test]
    async fn test_destroying_malformed_sid_is_a_no_op() {
        // no Redis needed: a malformed id never reaches the store
        let manager = manager().await;
        assert!(manager.destroy("user:7:whatever").await.is_ok());
    }

    #[tokio::test]
    async fn test_session_cookie_attributes() {
        let manager = manager().await;
        let cookie = manager.session_cookie("abc".to_string());

        assert_eq!(cookie.name(), "board.sid");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(cookie::time::Duration::seconds(600)));
    }

    #[tokio::test]
    async fn test_sid_from_jar() {
        let manager = manager().await;
        let jar = CookieJar::new().add(Cookie::new("board.sid", "0123"));
        assert_eq!(manager.sid_from_jar(&jar), Some("0123".to_string()));
        assert_eq!(manager.sid_from_jar(&CookieJar::new()), None);
    }

    #[tokio::test]
    async fn test_malformed_sid_never_reaches_redis() {
        // no Redis needed: the id is rejected before any command is sent
        let manager = manager().await;
        assert_eq!(manager.load("not-a-session").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_session_lifecycle() -> Result<()> {
        let manager = manager().await;
        let user = SessionUser {
            id: 1,
            email: "kim@example.com".to_string(),
            username: "kim".to_string(),
            image: None,
        };

        let sid = manager.create(&user).await?;
        assert_eq!(manager.load(&sid).await?, Some(user.clone()));

        let renamed = SessionUser {
            username: "kimchi".to_string(),
            ..user
        };
        manager.update(&sid, &renamed).await?;
        assert_eq!(manager.load(&sid).await?, Some(renamed));

        manager.destroy(&sid).await?;
        assert_eq!(manager.load(&sid).await?, None);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_revoke_user_sessions_keeps_current() -> Result<()> {
        let manager = manager().await;
        let user = SessionUser {
            id: i64::from(rand::random::<u32>()) + 1_000_000,
            email: "lee@example.com".to_string(),
            username: "lee".to_string(),
            image: None,
        };

        let current = manager.create(&user).await?;
        let laptop = manager.create(&user).await?;
        let phone = manager.create(&user).await?;

        assert_eq!(manager.revoke_user_sessions(user.id, Some(&current)).await?, 2);
        assert_eq!(manager.load(&laptop).await?, None);
        assert_eq!(manager.load(&phone).await?, None);
        assert_eq!(manager.load(&current).await?, Some(user.clone()));

        assert_eq!(manager.revoke_user_sessions(user.id, None).await?, 1);
        assert_eq!(manager.load(&current).await?, None);
        Ok(())
    }
}
