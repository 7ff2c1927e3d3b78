//! Comment store.

use crate::db::with_timeout;
use crate::error::StoreResult;
use async_trait::async_trait;
use deadpool_postgres::Pool;
use gather_core::{Comment, PostId, UserId};

/// Input for comment creation.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
}

#[async_trait]
pub trait Comments: Send + Sync {
    async fn create(&self, comment: NewComment) -> StoreResult<Comment>;
    async fn list_by_post(&self, post_id: PostId) -> StoreResult<Vec<Comment>>;
}

/// PostgreSQL-backed comment store.
#[derive(Clone)]
pub struct PgCommentStore {
    pool: Pool,
}

impl PgCommentStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Comments for PgCommentStore {
    async fn create(&self, comment: NewComment) -> StoreResult<Comment> {
        let conn = self.pool.get().await?;

        let row = with_timeout(conn.query_one(
            "INSERT INTO comments (post_id, user_id, content)
             VALUES ($1, $2, $3)
             RETURNING id, created_at, updated_at",
            &[&comment.post_id, &comment.user_id, &comment.content],
        ))
        .await?;

        Ok(Comment {
            id: row.get("id"),
            post_id: comment.post_id,
            user_id: comment.user_id,
            content: comment.content,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn list_by_post(&self, post_id: PostId) -> StoreResult<Vec<Comment>> {
        let conn = self.pool.get().await?;

        let rows = with_timeout(conn.query(
            "SELECT id, post_id, user_id, content, created_at, updated_at
             FROM comments
             WHERE post_id = $1
             ORDER BY created_at DESC",
            &[&post_id],
        ))
        .await?;

        Ok(rows
            .iter()
            .map(|row| Comment {
                id: row.get("id"),
                post_id: row.get("post_id"),
                user_id: row.get("user_id"),
                content: row.get("content"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }
}
