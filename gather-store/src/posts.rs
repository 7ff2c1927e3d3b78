//! Post store with optimistic concurrency control.
//!
//! Updates are a single conditional statement: the row is mutated only if
//! the stored `version` still equals the version the caller read, and the
//! version increments in the same statement. Concurrent writers race at the
//! storage layer; no application-level locking.

use crate::db::with_timeout;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use gather_core::{Post, PostId};
use tokio_postgres::Row;

/// Store surface for posts.
#[async_trait]
pub trait Posts: Send + Sync {
    async fn create(&self, post: Post) -> StoreResult<Post>;
    async fn read(&self, id: PostId) -> StoreResult<Post>;

    /// Conditional, versioned update.
    ///
    /// The caller supplies the post with the version it last read. If the
    /// stored version has moved (or the row is gone) no row is mutated and
    /// `ConcurrentModification` is returned; the caller re-reads and retries
    /// at its own discretion. On success the returned `version` and
    /// `updated_at` are authoritative.
    async fn update(&self, post: Post) -> StoreResult<Post>;

    async fn delete(&self, id: PostId) -> StoreResult<()>;
}

/// PostgreSQL-backed post store.
#[derive(Clone)]
pub struct PgPostStore {
    pool: Pool,
}

impl PgPostStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn row_to_post(row: &Row) -> Post {
        Post {
            id: row.get("id"),
            title: row.get("title"),
            content: row.get("content"),
            user_id: row.get("user_id"),
            tags: row.get("tags"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            version: row.get("version"),
        }
    }
}

#[async_trait]
impl Posts for PgPostStore {
    async fn create(&self, mut post: Post) -> StoreResult<Post> {
        let conn = self.pool.get().await?;

        let row = with_timeout(conn.query_one(
            "INSERT INTO posts (title, content, user_id, tags)
             VALUES ($1, $2, $3, $4)
             RETURNING id, created_at, updated_at, version",
            &[&post.title, &post.content, &post.user_id, &post.tags],
        ))
        .await?;

        post.id = row.get("id");
        post.created_at = row.get("created_at");
        post.updated_at = row.get("updated_at");
        post.version = row.get("version");
        Ok(post)
    }

    async fn read(&self, id: PostId) -> StoreResult<Post> {
        let conn = self.pool.get().await?;

        let row = with_timeout(conn.query_opt(
            "SELECT id, title, content, user_id, tags, created_at, updated_at, version
             FROM posts
             WHERE id = $1",
            &[&id],
        ))
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(Self::row_to_post(&row))
    }

    async fn update(&self, mut post: Post) -> StoreResult<Post> {
        let conn = self.pool.get().await?;

        let row = with_timeout(conn.query_opt(
            "UPDATE posts
             SET title = $1, content = $2, tags = $3, updated_at = now(), version = version + 1
             WHERE id = $4 AND version = $5
             RETURNING updated_at, version",
            &[
                &post.title,
                &post.content,
                &post.tags,
                &post.id,
                &post.version,
            ],
        ))
        .await?
        .ok_or(StoreError::ConcurrentModification)?;

        post.updated_at = row.get("updated_at");
        post.version = row.get("version");
        Ok(post)
    }

    async fn delete(&self, id: PostId) -> StoreResult<()> {
        let conn = self.pool.get().await?;

        let deleted =
            with_timeout(conn.execute("DELETE FROM posts WHERE id = $1", &[&id])).await?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
