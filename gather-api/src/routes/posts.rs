//! Post and Comment Endpoints
//!
//! Updates use optimistic concurrency: the handler reads the post, merges
//! the payload's present fields onto it (absent fields keep their last-read
//! values), and submits the update conditioned on the version it read. A
//! client may pin an explicit `version` in the payload to extend the check
//! across its own read-modify-write cycle; a conflict surfaces as 409 and
//! mutates nothing.

use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use gather_core::{Comment, Post, PostId};
use gather_store::NewComment;
use serde::Deserialize;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Expected version for optimistic concurrency. Defaults to the
    /// version read inside this handler.
    pub version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

// ============================================================================
// VALIDATION
// ============================================================================

fn validate_title(title: &str) -> ApiResult<()> {
    if title.is_empty() || title.len() > 100 {
        return Err(ApiError::validation_failed(
            "title must be between 1 and 100 characters",
        ));
    }
    Ok(())
}

fn validate_content(content: &str) -> ApiResult<()> {
    if content.is_empty() || content.len() > 1000 {
        return Err(ApiError::validation_failed(
            "content must be between 1 and 1000 characters",
        ));
    }
    Ok(())
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /v1/posts
pub async fn create_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    validate_title(&payload.title)?;
    validate_content(&payload.content)?;

    let now = Utc::now();
    let post = state
        .posts
        .create(Post {
            id: 0,
            title: payload.title,
            content: payload.content,
            user_id: current.id,
            tags: payload.tags,
            created_at: now,
            updated_at: now,
            version: 1,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /v1/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<PostId>,
) -> ApiResult<Json<Post>> {
    let post = state.posts.read(id).await?;
    Ok(Json(post))
}

/// PATCH /v1/posts/:id
pub async fn update_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<PostId>,
    Json(payload): Json<UpdatePostRequest>,
) -> ApiResult<Json<Post>> {
    let mut post = state.posts.read(id).await?;

    if post.user_id != current.id {
        return Err(ApiError::forbidden("Posts can only be edited by their author"));
    }

    // Field-level merge happens here, above the store boundary: absent
    // payload fields keep the values read a moment ago.
    if let Some(title) = payload.title {
        validate_title(&title)?;
        post.title = title;
    }
    if let Some(content) = payload.content {
        validate_content(&content)?;
        post.content = content;
    }
    if let Some(tags) = payload.tags {
        post.tags = tags;
    }
    if let Some(version) = payload.version {
        post.version = version;
    }

    let updated = state.posts.update(post).await?;
    Ok(Json(updated))
}

/// DELETE /v1/posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<PostId>,
) -> ApiResult<StatusCode> {
    let post = state.posts.read(id).await?;
    if post.user_id != current.id {
        return Err(ApiError::forbidden("Posts can only be deleted by their author"));
    }
    state.posts.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/posts/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<PostId>,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    validate_content(&payload.content)?;

    // Commenting on a missing post is a 404, not a dangling row.
    state.posts.read(id).await?;

    let comment = state
        .comments
        .create(NewComment {
            post_id: id,
            user_id: current.id,
            content: payload.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /v1/posts/:id/comments
pub async fn list_comments(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<PostId>,
) -> ApiResult<Json<Vec<Comment>>> {
    state.posts.read(id).await?;
    let comments = state.comments.list_by_post(id).await?;
    Ok(Json(comments))
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route(
            "/posts/:id",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .route(
            "/posts/:id/comments",
            post(create_comment).get(list_comments),
        )
}

// ============================================================================
// TESTS
// ============================================================================
