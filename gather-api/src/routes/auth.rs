//! Registration and Login Endpoints
//!
//! - POST /v1/auth/register: create an account and send the invitation mail
//! - POST /v1/auth/token: exchange email + password for a bearer token
//!
//! Both endpoints are public (rate-limited only). Login only succeeds for
//! activated accounts.

use crate::auth::{generate_token, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::services::RegistrationService;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use gather_core::User;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user: User,
    /// Plaintext activation token, present outside production only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

// ============================================================================
// VALIDATION
// ============================================================================

fn validate_register(payload: &RegisterRequest) -> ApiResult<()> {
    if payload.username.is_empty() || payload.username.len() > 100 {
        return Err(ApiError::validation_failed(
            "username must be between 1 and 100 characters",
        ));
    }
    if payload.email.is_empty() || payload.email.len() > 255 || !payload.email.contains('@') {
        return Err(ApiError::validation_failed("email must be a valid address"));
    }
    if payload.password.len() < 8 || payload.password.len() > 72 {
        return Err(ApiError::validation_failed(
            "password must be between 8 and 72 characters",
        ));
    }
    Ok(())
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    validate_register(&payload)?;

    let service = RegistrationService::new(
        Arc::clone(&state.users),
        Arc::clone(&state.mailer),
        Arc::clone(&state.config),
    );
    let registration = service
        .register(payload.username, payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: registration.user,
            activation_token: registration.plaintext_token,
        }),
    ))
}

/// POST /v1/auth/token
pub async fn token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    // read_by_email only returns activated accounts, so unactivated users
    // and unknown emails fail identically.
    let user = state
        .users
        .read_by_email(&payload.email)
        .await
        .map_err(|_| ApiError::unauthorized("Invalid credentials"))?;

    let stored_hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| ApiError::internal_error("User record has no password hash"))?;

    if !verify_password(&payload.password, stored_hash)? {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = generate_token(&state.auth, user.id)?;
    Ok(Json(TokenResponse { token }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/token", post(token))
}

// ============================================================================
// TESTS
// ============================================================================
