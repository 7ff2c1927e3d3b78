//! Gather API - HTTP layer
//!
//! Axum-based HTTP API over the Gather stores. Provides registration with
//! email activation, bearer-token authentication with a cached current-user
//! lookup, optimistically-versioned posts, comments, follows, and a
//! per-client fixed-window rate limit on every request.

pub mod auth;
pub mod config;
pub mod error;
pub mod mailer;
pub mod middleware;
pub mod ratelimiter;
pub mod routes;
pub mod services;
pub mod state;

pub use auth::AuthConfig;
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use mailer::{Mailer, MailerError, SendGridMailer};
pub use middleware::CurrentUser;
pub use ratelimiter::{FixedWindowLimiter, RateLimitDecision};
pub use routes::create_api_router;
pub use services::RegistrationService;
pub use state::AppState;
