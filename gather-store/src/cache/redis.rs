//! Redis implementation of the user cache.

use super::{user_cache_key, UserCache, USER_CACHE_TTL_SECS};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Pool, Runtime};
use gather_core::{User, UserId};

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub enabled: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            enabled: true,
        }
    }
}

impl RedisConfig {
    /// Create a Redis configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("GATHER_REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379/0".to_string()),
            enabled: std::env::var("GATHER_REDIS_ENABLED")
                .map(|s| s.to_lowercase() != "false")
                .unwrap_or(true),
        }
    }

    /// Create a connection pool. Connections are established lazily.
    pub fn create_pool(&self) -> StoreResult<Pool> {
        deadpool_redis::Config::from_url(&self.url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Cache(format!("failed to create redis pool: {e}")))
    }
}

/// Redis-backed user cache: JSON bodies under `user:{id}` with a fixed TTL.
#[derive(Clone)]
pub struct RedisUserCache {
    pool: Pool,
}

impl RedisUserCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Cache(format!("redis connection: {e}")))
    }
}

#[async_trait]
impl UserCache for RedisUserCache {
    async fn get(&self, id: UserId) -> StoreResult<Option<User>> {
        let mut conn = self.conn().await?;

        let body: Option<String> = conn
            .get(user_cache_key(id))
            .await
            .map_err(|e| StoreError::Cache(format!("redis get: {e}")))?;

        match body {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, user: &User) -> StoreResult<()> {
        if user.id <= 0 {
            return Err(StoreError::InvalidEntity(
                "refusing to cache a user without an id".to_string(),
            ));
        }

        let json = serde_json::to_string(user)?;
        let mut conn = self.conn().await?;

        conn.set_ex::<_, _, ()>(user_cache_key(user.id), json, USER_CACHE_TTL_SECS)
            .await
            .map_err(|e| StoreError::Cache(format!("redis set: {e}")))
    }

    async fn delete(&self, id: UserId) -> StoreResult<()> {
        let mut conn = self.conn().await?;

        conn.del::<_, ()>(user_cache_key(id))
            .await
            .map_err(|e| StoreError::Cache(format!("redis del: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    // Pool creation is lazy, so the identity guard is reachable without a
    // live Redis.
    #[tokio::test]
    async fn test_set_rejects_user_without_id() {
        let cache = RedisUserCache::new(RedisConfig::default().create_pool().unwrap());
        let user = User {
            id: 0,
            username: "nobody".to_string(),
            email: "n@example.com".to_string(),
            password_hash: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            activated: false,
        };

        let err = cache.set(&user).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidEntity(_)));
    }
}
