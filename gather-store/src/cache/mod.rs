//! Redis-backed cache layer for the current-user read path.
//!
//! The cache entry is a disposable copy; PostgreSQL stays the sole source of
//! truth. Entries expire by TTL only - there is no invalidation wired into
//! user mutations, so a read can be stale for up to the TTL after a write.
//! That staleness window is accepted and asserted in the consumer's tests,
//! not papered over here.

mod redis;

pub use redis::{RedisConfig, RedisUserCache};

use crate::error::StoreResult;
use async_trait::async_trait;
use gather_core::{User, UserId};

/// Time-to-live for cached user entries.
pub const USER_CACHE_TTL_SECS: u64 = 3600;

/// Cache surface for user entities.
///
/// `get` returning `Ok(None)` means a clean miss; "never cached" and
/// "expired" are indistinguishable to callers. A transport error is an
/// `Err`, which consumers absorb (log and fall through to the store) - the
/// cache is never allowed to fail a request.
#[async_trait]
pub trait UserCache: Send + Sync {
    async fn get(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Store a user under its id with the configured TTL. Rejects users
    /// without a valid identity so a zero-value entity can never be cached.
    async fn set(&self, user: &User) -> StoreResult<()>;

    async fn delete(&self, id: UserId) -> StoreResult<()>;
}

/// Cache key for a user entry.
pub(crate) fn user_cache_key(id: UserId) -> String {
    format!("user:{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_cache_key_format() {
        assert_eq!(user_cache_key(42), "user:42");
    }
}
