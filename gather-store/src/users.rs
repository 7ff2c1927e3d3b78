//! User store: reads, follow graph, feed, and the two transactional
//! workflows (registration with invitation, activation).

use crate::db::with_timeout;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::Pool;
use gather_core::{NewUser, Timestamp, User, UserFeedItem, UserId};
use std::time::Duration;
use tokio_postgres::Row;

/// Feed sort order. Restricted to an enum so the keyword can be spliced
/// into the statement without an injection surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSort {
    Asc,
    #[default]
    Desc,
}

impl FeedSort {
    fn as_sql(self) -> &'static str {
        match self {
            FeedSort::Asc => "ASC",
            FeedSort::Desc => "DESC",
        }
    }
}

/// Pagination and filtering for the home feed.
#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub limit: i64,
    pub offset: i64,
    pub sort: FeedSort,
    pub search: String,
    pub tags: Vec<String>,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            sort: FeedSort::Desc,
            search: String::new(),
            tags: Vec::new(),
        }
    }
}

/// Store surface for user rows and the invitation workflows.
#[async_trait]
pub trait Users: Send + Sync {
    /// Create the user row and its invitation record in one transaction.
    ///
    /// Uniqueness violations surface per field (`EmailTaken`,
    /// `UsernameTaken`); in that case nothing has been committed.
    async fn create_and_invite(
        &self,
        user: NewUser,
        token_hash: &str,
        expiry: Duration,
    ) -> StoreResult<User>;

    async fn read_by_id(&self, id: UserId) -> StoreResult<User>;

    /// Read an activated user by email, including the password hash.
    async fn read_by_email(&self, email: &str) -> StoreResult<User>;

    /// Consume an invitation and activate the account, atomically.
    ///
    /// Unknown token or a token belonging to a different user both report
    /// `NotFound`; an expired token reports `InvitationExpired` and leaves
    /// the record in place. Any failure rolls back the whole transaction.
    async fn activate(&self, user_id: UserId, token_hash: &str) -> StoreResult<()>;

    /// Delete a user and their invitation records. Also the compensating
    /// action when the invitation email cannot be delivered.
    async fn delete(&self, id: UserId) -> StoreResult<()>;

    async fn follow(&self, user_id: UserId, follower_id: UserId) -> StoreResult<()>;
    async fn unfollow(&self, user_id: UserId, follower_id: UserId) -> StoreResult<()>;

    async fn feed(&self, user_id: UserId, query: &FeedQuery) -> StoreResult<Vec<UserFeedItem>>;
}

/// PostgreSQL-backed user store.
#[derive(Clone)]
pub struct PgUserStore {
    pool: Pool,
}

impl PgUserStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &Row) -> User {
        User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            password_hash: None,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            activated: row.get("activated"),
        }
    }
}

#[async_trait]
impl Users for PgUserStore {
    async fn create_and_invite(
        &self,
        user: NewUser,
        token_hash: &str,
        expiry: Duration,
    ) -> StoreResult<User> {
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await.map_err(StoreError::from)?;

        let row = with_timeout(tx.query_one(
            "INSERT INTO users (username, email, password_hash)
             VALUES ($1, $2, $3)
             RETURNING id, created_at, updated_at",
            &[&user.username, &user.email, &user.password_hash],
        ))
        .await?;

        let id: UserId = row.get("id");
        let created_at: Timestamp = row.get("created_at");
        let updated_at: Timestamp = row.get("updated_at");

        let expires_at = Utc::now()
            + chrono::Duration::from_std(expiry)
                .map_err(|_| StoreError::InvalidEntity("invitation expiry out of range".into()))?;

        with_timeout(tx.execute(
            "INSERT INTO user_invitations (user_id, token_hash, expires_at)
             VALUES ($1, $2, $3)",
            &[&id, &token_hash, &expires_at],
        ))
        .await?;

        tx.commit().await.map_err(StoreError::from)?;

        Ok(User {
            id,
            username: user.username,
            email: user.email,
            password_hash: None,
            created_at,
            updated_at,
            activated: false,
        })
    }

    async fn read_by_id(&self, id: UserId) -> StoreResult<User> {
        let conn = self.pool.get().await?;

        let row = with_timeout(conn.query_opt(
            "SELECT id, username, email, created_at, updated_at, activated
             FROM users
             WHERE id = $1",
            &[&id],
        ))
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(Self::row_to_user(&row))
    }

    async fn read_by_email(&self, email: &str) -> StoreResult<User> {
        let conn = self.pool.get().await?;

        let row = with_timeout(conn.query_opt(
            "SELECT id, username, email, password_hash, created_at, updated_at, activated
             FROM users
             WHERE email = $1 AND activated = true",
            &[&email],
        ))
        .await?
        .ok_or(StoreError::NotFound)?;

        let mut user = Self::row_to_user(&row);
        user.password_hash = Some(row.get("password_hash"));
        Ok(user)
    }

    async fn activate(&self, user_id: UserId, token_hash: &str) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await.map_err(StoreError::from)?;

        let row = with_timeout(tx.query_opt(
            "SELECT user_id, expires_at
             FROM user_invitations
             WHERE token_hash = $1",
            &[&token_hash],
        ))
        .await?
        .ok_or(StoreError::NotFound)?;

        let invitation_user_id: UserId = row.get("user_id");
        let expires_at: Timestamp = row.get("expires_at");

        // A token belonging to another user reads as absent: do not leak
        // its existence.
        if invitation_user_id != user_id {
            return Err(StoreError::NotFound);
        }
        // Expired records are left in place until swept externally.
        if Utc::now() > expires_at {
            return Err(StoreError::InvitationExpired);
        }

        with_timeout(tx.execute(
            "UPDATE users SET activated = true, updated_at = now() WHERE id = $1",
            &[&user_id],
        ))
        .await?;

        with_timeout(tx.execute(
            "DELETE FROM user_invitations WHERE token_hash = $1",
            &[&token_hash],
        ))
        .await?;

        // Dropping the transaction before this point rolls everything back.
        tx.commit().await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn delete(&self, id: UserId) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        let tx = conn.transaction().await.map_err(StoreError::from)?;

        with_timeout(tx.execute("DELETE FROM user_invitations WHERE user_id = $1", &[&id])).await?;
        let deleted =
            with_timeout(tx.execute("DELETE FROM users WHERE id = $1", &[&id])).await?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn follow(&self, user_id: UserId, follower_id: UserId) -> StoreResult<()> {
        let conn = self.pool.get().await?;

        with_timeout(conn.execute(
            "INSERT INTO followers (user_id, follower_id) VALUES ($1, $2)",
            &[&user_id, &follower_id],
        ))
        .await?;
        Ok(())
    }

    async fn unfollow(&self, user_id: UserId, follower_id: UserId) -> StoreResult<()> {
        let conn = self.pool.get().await?;

        with_timeout(conn.execute(
            "DELETE FROM followers WHERE user_id = $1 AND follower_id = $2",
            &[&user_id, &follower_id],
        ))
        .await?;
        Ok(())
    }

    async fn feed(&self, user_id: UserId, query: &FeedQuery) -> StoreResult<Vec<UserFeedItem>> {
        let conn = self.pool.get().await?;

        let statement = format!(
            "SELECT
                p.id, p.user_id, p.title, p.content, p.created_at, p.tags,
                COUNT(c.id) AS comment_count,
                u.username
             FROM posts p
             LEFT JOIN comments c ON c.post_id = p.id
             LEFT JOIN users u ON p.user_id = u.id
             LEFT JOIN followers f ON f.user_id = p.user_id AND f.follower_id = $1
             WHERE
                (p.user_id = $1 OR f.follower_id = $1) AND
                (p.title ILIKE '%' || $2 || '%' OR p.content ILIKE '%' || $2 || '%') AND
                (p.tags @> $3 OR cardinality($3) = 0)
             GROUP BY p.id, u.username
             ORDER BY p.created_at {}
             OFFSET $4 LIMIT $5",
            query.sort.as_sql()
        );

        let rows = with_timeout(conn.query(
            &statement,
            &[
                &user_id,
                &query.search,
                &query.tags,
                &query.offset,
                &query.limit,
            ],
        ))
        .await?;

        Ok(rows
            .iter()
            .map(|row| UserFeedItem {
                id: row.get("id"),
                title: row.get("title"),
                user_id: row.get("user_id"),
                username: row.get("username"),
                content: row.get("content"),
                created_at: row.get("created_at"),
                tags: row.get("tags"),
                comment_count: row.get("comment_count"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_sort_keywords() {
        assert_eq!(FeedSort::Asc.as_sql(), "ASC");
        assert_eq!(FeedSort::Desc.as_sql(), "DESC");
    }

    #[test]
    fn test_feed_query_defaults() {
        let query = FeedQuery::default();
        assert_eq!(query.limit, 20);
        assert_eq!(query.offset, 0);
        assert_eq!(query.sort, FeedSort::Desc);
        assert!(query.search.is_empty());
        assert!(query.tags.is_empty());
    }

    #[test]
    fn test_feed_sort_deserializes_lowercase() {
        let sort: FeedSort = serde_json::from_str("\"asc\"").unwrap();
        assert_eq!(sort, FeedSort::Asc);
        assert!(serde_json::from_str::<FeedSort>("\"DROP TABLE\"").is_err());
    }
}

// Integration tests against a live PostgreSQL. Run with:
//   GATHER_DB_NAME=gather_test cargo test -p gather-store --features db-tests
#[cfg(all(test, feature = "db-tests"))]
mod db_tests {
    use super::*;
    use gather_core::hash_token;

    async fn test_pool() -> Pool {
        crate::db::DbConfig::from_env()
            .create_pool()
            .expect("test pool")
    }

    fn unique_new_user(tag: &str) -> NewUser {
        let nonce = uuid_like_nonce();
        NewUser {
            username: format!("{tag}_{nonce}"),
            email: format!("{tag}_{nonce}@example.com"),
            password_hash: "$argon2id$test".to_string(),
        }
    }

    fn uuid_like_nonce() -> String {
        format!("{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    #[tokio::test]
    async fn test_register_and_activate_roundtrip() {
        let store = PgUserStore::new(test_pool().await);
        let token_hash = hash_token("roundtrip-token");

        let user = store
            .create_and_invite(
                unique_new_user("roundtrip"),
                &token_hash,
                Duration::from_secs(3600),
            )
            .await
            .unwrap();
        assert!(!user.activated);

        store.activate(user.id, &token_hash).await.unwrap();
        let activated = store.read_by_id(user.id).await.unwrap();
        assert!(activated.activated);

        // The invitation is consumed exactly once.
        assert_eq!(
            store.activate(user.id, &token_hash).await,
            Err(StoreError::NotFound)
        );

        store.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_email_surfaces_per_field() {
        let store = PgUserStore::new(test_pool().await);
        let first = unique_new_user("dup");

        let user = store
            .create_and_invite(first.clone(), &hash_token("dup-a"), Duration::from_secs(60))
            .await
            .unwrap();

        let mut second = unique_new_user("dup2");
        second.email = first.email.clone();
        assert_eq!(
            store
                .create_and_invite(second, &hash_token("dup-b"), Duration::from_secs(60))
                .await,
            Err(StoreError::EmailTaken)
        );

        store.delete(user.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_invitation_left_in_place() {
        let store = PgUserStore::new(test_pool().await);
        let token_hash = hash_token("expired-token");

        let user = store
            .create_and_invite(
                unique_new_user("expired"),
                &token_hash,
                Duration::from_secs(0),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            store.activate(user.id, &token_hash).await,
            Err(StoreError::InvitationExpired)
        );

        // Record still present: activation with the same token still reports
        // expired, not absent, and the user remains unactivated.
        assert_eq!(
            store.activate(user.id, &token_hash).await,
            Err(StoreError::InvitationExpired)
        );
        assert!(!store.read_by_id(user.id).await.unwrap().activated);

        store.delete(user.id).await.unwrap();
    }
}
