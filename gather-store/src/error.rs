//! Error types for store operations.
//!
//! Business-rule conditions (not found, duplicates, version conflict,
//! expired invitation) are distinct variants so the API layer can map each
//! to its own response. Infrastructure failures collapse to generic
//! variants; full detail goes to the server log at the conversion site.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("email already exists")]
    EmailTaken,

    #[error("username already exists")]
    UsernameTaken,

    /// The conditional update matched zero rows: the stored version moved
    /// under the caller. Nothing was mutated.
    #[error("concurrent modification")]
    ConcurrentModification,

    #[error("invitation expired")]
    InvitationExpired,

    /// A statement exceeded the per-call timeout.
    #[error("operation timed out")]
    Timeout,

    #[error("invalid entity: {0}")]
    InvalidEntity(String),

    #[error("connection pool: {0}")]
    Pool(String),

    #[error("database operation failed: {0}")]
    Database(String),

    #[error("cache operation failed: {0}")]
    Cache(String),

    #[error("serialization failed: {0}")]
    Serde(String),
}

/// Unique-constraint names from the schema, used to turn a SQLSTATE 23505
/// into a per-field condition.
const USERS_EMAIL_KEY: &str = "users_email_key";
const USERS_USERNAME_KEY: &str = "users_username_key";

impl From<tokio_postgres::Error> for StoreError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            if db_err.code() == &tokio_postgres::error::SqlState::UNIQUE_VIOLATION {
                return match db_err.constraint() {
                    Some(USERS_EMAIL_KEY) => StoreError::EmailTaken,
                    Some(USERS_USERNAME_KEY) => StoreError::UsernameTaken,
                    _ => StoreError::Database("unique constraint violation".to_string()),
                };
            }
        }

        tracing::error!(error = %err, "database error");
        StoreError::Database(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!(error = %err, "connection pool error");
        StoreError::Pool(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}
