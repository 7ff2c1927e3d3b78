//! User Endpoints
//!
//! Activation is public (the account cannot log in yet, so the token plus
//! the user id in the path are the whole credential). Everything else
//! requires a bearer token.

use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::services::RegistrationService;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use gather_core::{User, UserFeedItem, UserId};
use gather_store::{FeedQuery, FeedSort};
use serde::Deserialize;
use std::sync::Arc;

// ============================================================================
// TYPES
// ============================================================================

/// Query parameters for the feed endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<FeedSort>,
    pub search: Option<String>,
    /// Comma-separated tag filter.
    pub tags: Option<String>,
}

impl FeedParams {
    fn into_query(self) -> ApiResult<FeedQuery> {
        let mut query = FeedQuery::default();
        if let Some(limit) = self.limit {
            if !(1..=100).contains(&limit) {
                return Err(ApiError::validation_failed("limit must be between 1 and 100"));
            }
            query.limit = limit;
        }
        if let Some(offset) = self.offset {
            if offset < 0 {
                return Err(ApiError::validation_failed("offset must not be negative"));
            }
            query.offset = offset;
        }
        if let Some(sort) = self.sort {
            query.sort = sort;
        }
        query.search = self.search.unwrap_or_default();
        query.tags = self
            .tags
            .map(|raw| {
                raw.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        Ok(query)
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /v1/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<UserId>,
) -> ApiResult<Json<User>> {
    let user = state.users.read_by_id(id).await?;
    Ok(Json(user))
}

/// PUT /v1/users/:user_id/activate/:token
pub async fn activate(
    State(state): State<AppState>,
    Path((user_id, token)): Path<(UserId, String)>,
) -> ApiResult<StatusCode> {
    let service = RegistrationService::new(
        Arc::clone(&state.users),
        Arc::clone(&state.mailer),
        Arc::clone(&state.config),
    );
    service.activate(user_id, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/users/:id/follow
pub async fn follow(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<UserId>,
) -> ApiResult<StatusCode> {
    if id == current.id {
        return Err(ApiError::invalid_input("Cannot follow yourself"));
    }
    // Target must exist before recording the edge.
    state.users.read_by_id(id).await?;
    state.users.follow(id, current.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /v1/users/:id/unfollow
pub async fn unfollow(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<UserId>,
) -> ApiResult<StatusCode> {
    state.users.unfollow(id, current.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/users/feed
pub async fn feed(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<FeedParams>,
) -> ApiResult<Json<Vec<UserFeedItem>>> {
    let query = params.into_query()?;
    let items = state.users.feed(current.id, &query).await?;
    Ok(Json(items))
}

/// DELETE /v1/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<UserId>,
) -> ApiResult<StatusCode> {
    if id != current.id {
        return Err(ApiError::forbidden("Accounts can only be deleted by their owner"));
    }
    state.users.delete(id).await?;
    if let Some(cache) = &state.user_cache {
        // Deletion is the one mutation that does evict, so a deleted
        // account cannot keep authenticating from cache for the TTL.
        if let Err(e) = cache.delete(id).await {
            tracing::warn!(user_id = id, error = %e, "User cache evict failed");
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTERS
// ============================================================================

/// Routes reachable without a bearer token.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/users/:user_id/activate/:token", put(activate))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/feed", get(feed))
        .route("/users/:id", get(get_user).delete(delete_user))
        .route("/users/:id/follow", put(follow))
        .route("/users/:id/unfollow", put(unfollow))
}

// ============================================================================
// TESTS
// ============================================================================
