//! Authentication Middleware
//!
//! Validates the Bearer token on every protected request and resolves the
//! token subject to a full user record, which is injected into request
//! extensions as `CurrentUser`.
//!
//! # Read path
//!
//! User resolution is cache-aside: consult the cache, fall back to the
//! store on a miss, then populate the cache for subsequent requests. Cache
//! failures in either direction are logged and absorbed; the store remains
//! the source of truth and a broken cache only costs latency.

use crate::auth::validate_token;
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::state::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use gather_core::{User, UserId};

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper for middleware that implements IntoResponse.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

// ============================================================================
// CURRENT USER
// ============================================================================

/// The authenticated user for this request.
///
/// Injected by `auth_middleware`; handlers receive it through the typed
/// extractor below.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "CurrentUser not found in request extensions. \
                     Ensure auth_middleware is applied to this route.",
                ))
            })
    }
}

impl std::ops::Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ============================================================================
// USER RESOLUTION (CACHE-ASIDE)
// ============================================================================

/// Resolve a user id to a user record through the cache-aside read path.
///
/// The cached copy is disposable: get or set failures are logged and the
/// lookup falls through to the store.
pub async fn resolve_user(state: &AppState, id: UserId) -> ApiResult<User> {
    let Some(cache) = &state.user_cache else {
        return Ok(state.users.read_by_id(id).await?);
    };

    match cache.get(id).await {
        Ok(Some(user)) => {
            tracing::debug!(user_id = id, "User cache hit");
            return Ok(user);
        }
        Ok(None) => {
            tracing::debug!(user_id = id, "User cache miss");
        }
        Err(e) => {
            tracing::warn!(user_id = id, error = %e, "User cache read failed, using store");
        }
    }

    let user = state.users.read_by_id(id).await?;

    if let Err(e) = cache.set(&user).await {
        tracing::warn!(user_id = id, error = %e, "User cache write failed");
    }

    Ok(user)
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Axum middleware for Bearer token authentication.
///
/// 1. Extracts the Authorization header and requires the Bearer scheme
/// 2. Validates the JWT (signature, expiry, issuer, audience)
/// 3. Resolves the subject to a user via the cache-aside read path
/// 4. Injects `CurrentUser` into request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            AuthMiddlewareError(ApiError::unauthorized("Authorization header is missing"))
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AuthMiddlewareError(ApiError::invalid_token(
            "Authorization header must use Bearer scheme",
        ))
    })?;

    let claims = validate_token(&state.auth, token).map_err(AuthMiddlewareError)?;
    let user_id = claims.user_id().map_err(AuthMiddlewareError)?;

    let user = resolve_user(&state, user_id).await.map_err(|e| {
        // A token whose subject no longer exists is an auth failure, not a 404.
        if e.code == ErrorCode::EntityNotFound {
            AuthMiddlewareError(ApiError::unauthorized("Unknown user"))
        } else {
            AuthMiddlewareError(e)
        }
    })?;

    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

// ============================================================================
// TESTS
// ============================================================================
