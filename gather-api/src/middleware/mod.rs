//! Middleware modules for the Gather API
//!
//! - `auth`: Bearer token authentication and current-user resolution
//! - `rate_limit`: Per-client fixed-window rate limiting
//!
//! # Middleware Order
//!
//! Rate limiting is the outermost layer so rejected requests never touch
//! authentication or the database:
//!
//! ```ignore
//! Router::new()
//!     .route("/v1/posts", post(handler))
//!     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
//!     .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
//! ```

mod auth;
mod rate_limit;

pub use auth::{auth_middleware, resolve_user, AuthMiddlewareError, CurrentUser};
pub use rate_limit::{rate_limit_middleware, RateLimitError};
