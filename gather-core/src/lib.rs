//! Gather Core - Entity Types
//!
//! Pure data structures shared by the store and API layers. This crate
//! contains only data types and small pure helpers (token hashing) - no I/O
//! and no business logic.

pub mod entities;
pub mod token;

use chrono::{DateTime, Utc};

/// Database identifiers are BIGSERIAL columns.
pub type UserId = i64;
pub type PostId = i64;
pub type CommentId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use entities::{Comment, Invitation, NewUser, Post, User, UserFeedItem};
pub use token::{hash_token, InvitationToken};
