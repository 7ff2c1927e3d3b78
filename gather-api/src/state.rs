//! Shared Application State
//!
//! One `AppState` is built at startup and cloned into every handler and
//! middleware. Stores and the mailer sit behind trait objects so tests can
//! substitute in-memory implementations.

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::mailer::Mailer;
use crate::ratelimiter::FixedWindowLimiter;
use gather_store::{Comments, Posts, UserCache, Users};
use std::sync::Arc;
use std::time::Instant;

/// Shared state for the API.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn Users>,
    pub posts: Arc<dyn Posts>,
    pub comments: Arc<dyn Comments>,

    /// Optional read-through cache for current-user lookups. `None` runs
    /// every lookup against the store.
    pub user_cache: Option<Arc<dyn UserCache>>,

    pub mailer: Arc<dyn Mailer>,
    pub limiter: Arc<FixedWindowLimiter>,

    pub config: Arc<ApiConfig>,
    pub auth: Arc<AuthConfig>,

    pub start_time: Instant,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn Users>,
        posts: Arc<dyn Posts>,
        comments: Arc<dyn Comments>,
        user_cache: Option<Arc<dyn UserCache>>,
        mailer: Arc<dyn Mailer>,
        config: ApiConfig,
        auth: AuthConfig,
    ) -> Self {
        let limiter = Arc::new(FixedWindowLimiter::new(
            config.rate_limit_requests,
            config.rate_limit_window,
        ));
        Self {
            users,
            posts,
            comments,
            user_cache,
            mailer,
            limiter,
            config: Arc::new(config),
            auth: Arc::new(auth),
            start_time: Instant::now(),
        }
    }
}
