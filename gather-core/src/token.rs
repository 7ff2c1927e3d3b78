//! Invitation token generation and hashing.
//!
//! The store only ever sees the SHA-256 hex digest of a token; the plaintext
//! goes into the activation link and is otherwise discarded.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A freshly generated invitation token: the plaintext for the activation
/// link, and the hash that gets persisted.
#[derive(Debug, Clone)]
pub struct InvitationToken {
    pub plaintext: String,
    pub hash: String,
}

impl InvitationToken {
    /// Generate a new random token and its persistent hash.
    pub fn generate() -> Self {
        let plaintext = Uuid::new_v4().to_string();
        let hash = hash_token(&plaintext);
        Self { plaintext, hash }
    }
}

/// Compute the SHA-256 hex digest of a plaintext token.
pub fn hash_token(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}
