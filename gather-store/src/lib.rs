//! Gather Store - PostgreSQL and Redis Access Layer
//!
//! This crate owns all persistence for the API: connection pooling, the SQL
//! statements behind each store operation, the transactional
//! registration/activation workflows, and the Redis-backed user cache.
//!
//! Every store surface is a trait (`Users`, `Posts`, `Comments`,
//! `UserCache`) with a Postgres/Redis implementation and an in-memory mock,
//! so the API layer and its tests depend only on the seams.

pub mod cache;
pub mod comments;
pub mod db;
pub mod error;
pub mod mocks;
pub mod posts;
pub mod users;

pub use cache::{RedisConfig, RedisUserCache, UserCache, USER_CACHE_TTL_SECS};
pub use comments::{Comments, NewComment, PgCommentStore};
pub use db::{DbConfig, QUERY_TIMEOUT};
pub use error::{StoreError, StoreResult};
pub use posts::{PgPostStore, Posts};
pub use users::{FeedQuery, FeedSort, PgUserStore, Users};
