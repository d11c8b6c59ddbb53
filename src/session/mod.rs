use std::collections::HashMap;
use std::sync::Mutex;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::{distributions::Alphanumeric, Rng};
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::SessionConfig;
use crate::state::AppState;

/// Server-side session payload. The user id lives under the fixed `user`
/// field, matching the queue-facing wire formats elsewhere.
#[derive(Debug, Serialize, Deserialize)]
struct SessionData {
    user: i64,
}

/// Server-side session storage keyed by the opaque cookie token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates a session for the user and returns the opaque token.
    async fn create(&self, user_id: i64) -> anyhow::Result<String>;
    /// Resolves a token back to a user id, if the session is still live.
    async fn user_id(&self, token: &str) -> anyhow::Result<Option<i64>>;
    async fn destroy(&self, token: &str) -> anyhow::Result<()>;
}

/// 48 alphanumeric chars from the thread-local CSPRNG. The token is only
/// meaningful through a server-side lookup, so it is not signed.
fn new_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

fn redis_key(token: &str) -> String {
    format!("sess:{}", token)
}

#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisSessionStore {
    pub fn new(conn: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { conn, ttl_seconds }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, user_id: i64) -> anyhow::Result<String> {
        let token = new_token();
        let payload = serde_json::to_string(&SessionData { user: user_id })?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(redis_key(&token), payload, self.ttl_seconds)
            .await?;
        Ok(token)
    }

    async fn user_id(&self, token: &str) -> anyhow::Result<Option<i64>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(redis_key(token)).await?;
        match raw {
            Some(json) => {
                let data: SessionData = serde_json::from_str(&json)?;
                Ok(Some(data.user))
            }
            None => Ok(None),
        }
    }

    async fn destroy(&self, token: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(redis_key(token)).await?;
        Ok(())
    }
}

/// In-process store used by `AppState::fake()` and unit tests.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, i64>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, user_id: i64) -> anyhow::Result<String> {
        let token = new_token();
        self.sessions
            .lock()
            .unwrap()
            .insert(token.clone(), user_id);
        Ok(token)
    }

    async fn user_id(&self, token: &str) -> anyhow::Result<Option<i64>> {
        Ok(self.sessions.lock().unwrap().get(token).copied())
    }

    async fn destroy(&self, token: &str) -> anyhow::Result<()> {
        self.sessions.lock().unwrap().remove(token);
        Ok(())
    }
}

/// Builds the session cookie. HttpOnly/Secure only in production and
/// SameSite relaxed to Lax there, mirroring the deployed cookie policy.
pub fn session_cookie(
    config: &SessionConfig,
    production: bool,
    token: String,
) -> Cookie<'static> {
    let mut cookie = Cookie::new(config.cookie_name.clone(), token);
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::seconds(config.ttl_seconds as i64));
    cookie.set_http_only(production);
    cookie.set_secure(production);
    cookie.set_same_site(if production {
        SameSite::Lax
    } else {
        SameSite::Strict
    });
    cookie
}

/// Expired cookie used to clear the session on signout.
pub fn removal_cookie(config: &SessionConfig) -> Cookie<'static> {
    let mut cookie = Cookie::new(config.cookie_name.clone(), "");
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::ZERO);
    cookie
}

/// Authenticated request context: session token plus the user id it maps to.
pub struct CurrentUser {
    pub user_id: i64,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = crate::error::ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| crate::error::ApiError::unauthorized("Unauthorized"))?;

        let token = jar
            .get(&state.config.session.cookie_name)
            .map(|c| c.value().to_string())
            .ok_or_else(|| crate::error::ApiError::unauthorized("Unauthorized"))?;

        let user_id = state
            .sessions
            .user_id(&token)
            .await
            .map_err(|e| {
                warn!(error = %e, "session lookup failed");
                crate::error::ApiError::unauthorized("Unauthorized")
            })?
            .ok_or_else(|| crate::error::ApiError::unauthorized("Unauthorized"))?;

        Ok(CurrentUser { user_id, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_unique() {
        let a = new_token();
        let b = new_token();
        assert_eq!(a.len(), 48);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn in_memory_store_roundtrip() {
        let store = InMemorySessionStore::default();
        let token = store.create(42).await.unwrap();
        assert_eq!(store.user_id(&token).await.unwrap(), Some(42));
        store.destroy(&token).await.unwrap();
        assert_eq!(store.user_id(&token).await.unwrap(), None);
    }

    #[test]
    fn production_cookie_is_locked_down() {
        let config = SessionConfig {
            cookie_name: "luxestay.sid".into(),
            ttl_seconds: 60 * 60 * 24 * 7,
        };
        let cookie = session_cookie(&config, true, "tok".into());
        assert_eq!(cookie.name(), "luxestay.sid");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));

        let dev = session_cookie(&config, false, "tok".into());
        assert_eq!(dev.same_site(), Some(SameSite::Strict));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let config = SessionConfig {
            cookie_name: "luxestay.sid".into(),
            ttl_seconds: 1,
        };
        let cookie = removal_cookie(&config);
        assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
    }
}
