//! In-memory mock implementations of the store traits.
//!
//! Used by the API layer's tests in place of live PostgreSQL/Redis. The
//! mocks reproduce the stores' observable semantics (per-field uniqueness,
//! versioned updates, invitation consumption) so consumer tests exercise
//! real contracts, plus failure knobs for the paths that need them.

use crate::cache::UserCache;
use crate::comments::{Comments, NewComment};
use crate::error::{StoreError, StoreResult};
use crate::posts::Posts;
use crate::users::{FeedQuery, Users};
use async_trait::async_trait;
use chrono::Utc;
use gather_core::{Comment, Invitation, NewUser, Post, PostId, User, UserFeedItem, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct MockUsersInner {
    users: HashMap<UserId, User>,
    invitations: HashMap<String, Invitation>,
    followers: Vec<(UserId, UserId)>,
    next_id: UserId,
}

/// In-memory `Users` implementation.
#[derive(Default)]
pub struct MockUsers {
    inner: Mutex<MockUsersInner>,
    /// Number of `read_by_id` calls, for cache-aside assertions.
    pub reads: AtomicUsize,
    /// When set, `delete` fails - exercises the compensation-failure path.
    pub fail_delete: AtomicBool,
    /// Ids passed to `delete`, in order.
    pub deleted: Mutex<Vec<UserId>>,
}

impl MockUsers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user directly, bypassing the registration workflow.
    pub fn insert_user(&self, user: User) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id = inner.next_id.max(user.id);
        inner.users.insert(user.id, user);
    }

    /// Mutate a seeded user in place (to demonstrate cache staleness).
    pub fn update_username(&self, id: UserId, username: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&id) {
            user.username = username.to_string();
        }
    }

    /// The invitation stored for a user, if any.
    pub fn invitation_for(&self, user_id: UserId) -> Option<Invitation> {
        let inner = self.inner.lock().unwrap();
        inner
            .invitations
            .values()
            .find(|inv| inv.user_id == user_id)
            .cloned()
    }

    /// Force an invitation's expiry into the past.
    pub fn expire_invitation(&self, user_id: UserId) {
        let mut inner = self.inner.lock().unwrap();
        for invitation in inner.invitations.values_mut() {
            if invitation.user_id == user_id {
                invitation.expires_at = Utc::now() - chrono::Duration::hours(1);
            }
        }
    }

    pub fn user(&self, id: UserId) -> Option<User> {
        self.inner.lock().unwrap().users.get(&id).cloned()
    }
}

#[async_trait]
impl Users for MockUsers {
    async fn create_and_invite(
        &self,
        user: NewUser,
        token_hash: &str,
        expiry: Duration,
    ) -> StoreResult<User> {
        let mut inner = self.inner.lock().unwrap();

        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::EmailTaken);
        }
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::UsernameTaken);
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let now = Utc::now();
        let stored = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: Some(user.password_hash),
            created_at: now,
            updated_at: now,
            activated: false,
        };
        inner.users.insert(id, stored.clone());
        inner.invitations.insert(
            token_hash.to_string(),
            Invitation {
                user_id: id,
                token_hash: token_hash.to_string(),
                expires_at: now
                    + chrono::Duration::from_std(expiry).unwrap_or(chrono::Duration::zero()),
            },
        );

        Ok(User {
            password_hash: None,
            ..stored
        })
    }

    async fn read_by_id(&self, id: UserId) -> StoreResult<User> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock().unwrap();
        inner
            .users
            .get(&id)
            .map(|user| User {
                password_hash: None,
                ..user.clone()
            })
            .ok_or(StoreError::NotFound)
    }

    async fn read_by_email(&self, email: &str) -> StoreResult<User> {
        let inner = self.inner.lock().unwrap();
        inner
            .users
            .values()
            .find(|u| u.email == email && u.activated)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn activate(&self, user_id: UserId, token_hash: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();

        let invitation = inner
            .invitations
            .get(token_hash)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        if invitation.user_id != user_id {
            return Err(StoreError::NotFound);
        }
        if invitation.is_expired(Utc::now()) {
            return Err(StoreError::InvitationExpired);
        }

        let user = inner.users.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        user.activated = true;
        user.updated_at = Utc::now();
        inner.invitations.remove(token_hash);
        Ok(())
    }

    async fn delete(&self, id: UserId) -> StoreResult<()> {
        self.deleted.lock().unwrap().push(id);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Database("delete failed".to_string()));
        }

        let mut inner = self.inner.lock().unwrap();
        inner.invitations.retain(|_, inv| inv.user_id != id);
        inner
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn follow(&self, user_id: UserId, follower_id: UserId) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.followers.push((user_id, follower_id));
        Ok(())
    }

    async fn unfollow(&self, user_id: UserId, follower_id: UserId) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .followers
            .retain(|&pair| pair != (user_id, follower_id));
        Ok(())
    }

    async fn feed(&self, _user_id: UserId, _query: &FeedQuery) -> StoreResult<Vec<UserFeedItem>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct MockPostsInner {
    posts: HashMap<PostId, Post>,
    next_id: PostId,
}

/// In-memory `Posts` implementation with real versioned-update semantics.
#[derive(Default)]
pub struct MockPosts {
    inner: Mutex<MockPostsInner>,
}

impl MockPosts {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Posts for MockPosts {
    async fn create(&self, mut post: Post) -> StoreResult<Post> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        post.id = inner.next_id;
        post.created_at = Utc::now();
        post.updated_at = post.created_at;
        post.version = 1;
        inner.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn read(&self, id: PostId) -> StoreResult<Post> {
        let inner = self.inner.lock().unwrap();
        inner.posts.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn update(&self, mut post: Post) -> StoreResult<Post> {
        let mut inner = self.inner.lock().unwrap();

        // Mirrors `UPDATE ... WHERE id = $ AND version = $`: the stored row
        // is untouched unless both match.
        let stored = inner
            .posts
            .get_mut(&post.id)
            .filter(|stored| stored.version == post.version)
            .ok_or(StoreError::ConcurrentModification)?;

        stored.title = post.title.clone();
        stored.content = post.content.clone();
        stored.tags = post.tags.clone();
        stored.updated_at = Utc::now();
        stored.version += 1;

        post.updated_at = stored.updated_at;
        post.version = stored.version;
        Ok(post)
    }

    async fn delete(&self, id: PostId) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .posts
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}

/// In-memory `Comments` implementation.
#[derive(Default)]
pub struct MockComments {
    comments: Mutex<Vec<Comment>>,
}

impl MockComments {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Comments for MockComments {
    async fn create(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut comments = self.comments.lock().unwrap();
        let now = Utc::now();
        let stored = Comment {
            id: comments.len() as i64 + 1,
            post_id: comment.post_id,
            user_id: comment.user_id,
            content: comment.content,
            created_at: now,
            updated_at: now,
        };
        comments.push(stored.clone());
        Ok(stored)
    }

    async fn list_by_post(&self, post_id: PostId) -> StoreResult<Vec<Comment>> {
        let comments = self.comments.lock().unwrap();
        Ok(comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }
}

/// In-memory `UserCache` with call counters and failure knobs.
#[derive(Default)]
pub struct MockUserCache {
    entries: Mutex<HashMap<UserId, User>>,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
}

impl MockUserCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.entries.lock().unwrap().contains_key(&id)
    }

    /// Drop an entry, standing in for TTL expiry.
    pub fn evict(&self, id: UserId) {
        self.entries.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl UserCache for MockUserCache {
    async fn get(&self, id: UserId) -> StoreResult<Option<User>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StoreError::Cache("cache unavailable".to_string()));
        }
        Ok(self.entries.lock().unwrap().get(&id).cloned())
    }

    async fn set(&self, user: &User) -> StoreResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(StoreError::Cache("cache unavailable".to_string()));
        }
        if user.id <= 0 {
            return Err(StoreError::InvalidEntity(
                "refusing to cache a user without an id".to_string(),
            ));
        }
        self.entries.lock().unwrap().insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: UserId) -> StoreResult<()> {
        self.entries.lock().unwrap().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft_post(user_id: UserId) -> Post {
        Post {
            id: 0,
            title: "Title".to_string(),
            content: "Content".to_string(),
            user_id,
            tags: vec!["tag".to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            version: 0,
        }
    }

    #[tokio::test]
    async fn test_mock_posts_optimistic_update() {
        let posts = MockPosts::new();
        let post = posts.create(draft_post(1)).await.unwrap();
        assert_eq!(post.version, 1);

        let mut fresh = post.clone();
        fresh.title = "Updated".to_string();
        let updated = posts.update(fresh).await.unwrap();
        assert_eq!(updated.version, 2);

        // A writer still presenting version 1 conflicts and mutates nothing.
        let mut stale = post.clone();
        stale.title = "Stale".to_string();
        assert_eq!(
            posts.update(stale).await,
            Err(StoreError::ConcurrentModification)
        );
        let stored = posts.read(post.id).await.unwrap();
        assert_eq!(stored.title, "Updated");
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_mock_users_invitation_consumed_once() {
        let users = MockUsers::new();
        let user = users
            .create_and_invite(
                NewUser {
                    username: "alice".to_string(),
                    email: "a@x.com".to_string(),
                    password_hash: "hash".to_string(),
                },
                "token-hash",
                Duration::from_secs(3600),
            )
            .await
            .unwrap();

        users.activate(user.id, "token-hash").await.unwrap();
        assert!(users.user(user.id).unwrap().activated);

        // Consumed exactly once: the second attempt reads as absent.
        assert_eq!(
            users.activate(user.id, "token-hash").await,
            Err(StoreError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_mock_users_expired_invitation_left_in_place() {
        let users = MockUsers::new();
        let user = users
            .create_and_invite(
                NewUser {
                    username: "bob".to_string(),
                    email: "b@x.com".to_string(),
                    password_hash: "hash".to_string(),
                },
                "expired-hash",
                Duration::from_secs(3600),
            )
            .await
            .unwrap();
        users.expire_invitation(user.id);

        assert_eq!(
            users.activate(user.id, "expired-hash").await,
            Err(StoreError::InvitationExpired)
        );
        // Distinct from not-found, record still present, user unactivated.
        assert!(users.invitation_for(user.id).is_some());
        assert!(!users.user(user.id).unwrap().activated);
    }

    #[tokio::test]
    async fn test_mock_users_wrong_user_reads_as_absent() {
        let users = MockUsers::new();
        let user = users
            .create_and_invite(
                NewUser {
                    username: "carol".to_string(),
                    email: "c@x.com".to_string(),
                    password_hash: "hash".to_string(),
                },
                "carol-hash",
                Duration::from_secs(3600),
            )
            .await
            .unwrap();

        assert_eq!(
            users.activate(user.id + 1, "carol-hash").await,
            Err(StoreError::NotFound)
        );
        assert!(!users.user(user.id).unwrap().activated);
    }

    #[tokio::test]
    async fn test_mock_cache_get_after_set() {
        let cache = MockUserCache::new();
        let users = MockUsers::new();
        let user = users
            .create_and_invite(
                NewUser {
                    username: "dave".to_string(),
                    email: "d@x.com".to_string(),
                    password_hash: "hash".to_string(),
                },
                "dave-hash",
                Duration::from_secs(3600),
            )
            .await
            .unwrap();

        cache.set(&user).await.unwrap();
        assert_eq!(cache.get(user.id).await.unwrap(), Some(user.clone()));

        // After eviction (TTL stand-in) the entry reads as a clean miss.
        cache.evict(user.id);
        assert_eq!(cache.get(user.id).await.unwrap(), None);
    }
}
