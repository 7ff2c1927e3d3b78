//! Route Modules and Router Assembly
//!
//! Rate limiting wraps the whole surface so rejected requests never reach
//! authentication or the database. Authentication wraps everything except
//! health, registration, login, and activation.

pub mod auth;
pub mod health;
pub mod posts;
pub mod users;

use crate::middleware::{auth_middleware, rate_limit_middleware};
use crate::state::AppState;
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

/// Build the full API router.
pub fn create_api_router(state: AppState) -> Router {
    let public = Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(users::public_router());

    let protected = Router::new()
        .merge(users::router())
        .merge(posts::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/v1", public.merge(protected))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
