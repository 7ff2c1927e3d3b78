//! Authentication Primitives
//!
//! JWT issuance and validation plus Argon2 password hashing. The API issues
//! HS256 bearer tokens with issuer and audience claims; the auth middleware
//! validates them and resolves the subject to a user.

use crate::error::{ApiError, ApiResult};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use gather_core::UserId;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

// ============================================================================
// AUTH CONFIGURATION
// ============================================================================

/// Configuration for token issuance and validation.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for HS256 signing.
    pub jwt_secret: String,

    /// Issuer claim stamped into and required of every token.
    pub issuer: String,

    /// Audience claim stamped into and required of every token.
    pub audience: String,

    /// Token lifetime in seconds.
    pub token_expiry_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-change-me".to_string(),
            issuer: "gather".to_string(),
            audience: "gather".to_string(),
            token_expiry_secs: 3 * 24 * 3600,
        }
    }
}

impl AuthConfig {
    /// Create AuthConfig from environment variables.
    ///
    /// Environment variables:
    /// - `GATHER_JWT_SECRET`: HMAC secret (default: dev secret)
    /// - `GATHER_JWT_ISSUER`: Issuer claim (default: gather)
    /// - `GATHER_JWT_AUDIENCE`: Audience claim (default: gather)
    /// - `GATHER_JWT_EXPIRY_SECS`: Token lifetime (default: 259200)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            jwt_secret: std::env::var("GATHER_JWT_SECRET").unwrap_or(defaults.jwt_secret),
            issuer: std::env::var("GATHER_JWT_ISSUER").unwrap_or(defaults.issuer),
            audience: std::env::var("GATHER_JWT_AUDIENCE").unwrap_or(defaults.audience),
            token_expiry_secs: std::env::var("GATHER_JWT_EXPIRY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.token_expiry_secs),
        }
    }
}

// ============================================================================
// JWT CLAIMS
// ============================================================================

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID, stringified)
    pub sub: String,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Issuer
    pub iss: String,

    /// Audience
    pub aud: String,
}

impl Claims {
    /// The subject parsed back to a user id.
    pub fn user_id(&self) -> ApiResult<UserId> {
        self.sub
            .parse()
            .map_err(|_| ApiError::invalid_token("Token subject is not a valid user id"))
    }
}

/// Generate a signed JWT for a user.
pub fn generate_token(config: &AuthConfig, user_id: UserId) -> ApiResult<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + config.token_expiry_secs as i64,
        iat: now,
        nbf: now,
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
    };

    let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), &claims, &encoding_key)
        .map_err(|e| ApiError::internal_error(format!("Failed to generate token: {}", e)))
}

/// Validate a JWT and extract claims.
///
/// Checks signature, expiry, issuer, and audience.
pub fn validate_token(config: &AuthConfig, token: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);

    let token_data =
        decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => ApiError::token_expired(),
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_token("Token signature is invalid")
            }
            _ => ApiError::invalid_token(format!("Token validation failed: {}", e)),
        })?;

    Ok(token_data.claims)
}

// ============================================================================
// PASSWORD HASHING
// ============================================================================

/// Hash a password with Argon2id and a fresh salt.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal_error(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a stored Argon2 hash.
pub fn verify_password(password: &str, stored_hash: &str) -> ApiResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::internal_error(format!("Stored hash is malformed: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
