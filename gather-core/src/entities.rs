//! Core entity structures

use crate::{CommentId, PostId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A registered account.
///
/// The password hash is deliberately excluded from serialization in both
/// directions: a `User` written to the cache or to a response body never
/// carries secret material, and a `User` read back from the cache never
/// claims to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub activated: bool,
}

/// Input for user creation. The password arrives already hashed; hashing
/// policy belongs to the API layer.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// A post with an optimistic-concurrency version.
///
/// `version` starts at 1 on insert and increments by exactly one on every
/// successful update. It never decreases and never resets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    pub user_id: UserId,
    pub tags: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// One row of a user's home feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFeedItem {
    pub id: PostId,
    pub title: String,
    pub user_id: UserId,
    pub username: String,
    pub content: String,
    pub created_at: Timestamp,
    pub tags: Vec<String>,
    pub comment_count: i64,
}

/// A pending account-activation record.
///
/// Only the SHA-256 hash of the invitation token is persisted; the plaintext
/// token exists solely in the invitation email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: Timestamp,
}

impl Invitation {
    /// Whether the invitation has passed its expiry instant.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn test_user() -> User {
        User {
            id: 7,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password_hash: Some("$argon2id$not-a-real-hash".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            activated: false,
        }
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = test_user();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));

        let roundtrip: User = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip.password_hash, None);
        assert_eq!(roundtrip.username, user.username);
        assert_eq!(roundtrip.id, user.id);
    }

    #[test]
    fn test_invitation_expiry() {
        let now = Utc::now();
        let invitation = Invitation {
            user_id: 1,
            token_hash: "abc".to_string(),
            expires_at: now + Duration::hours(1),
        };

        assert!(!invitation.is_expired(now));
        assert!(invitation.is_expired(now + Duration::hours(2)));
    }
}
