//! Gather API Server Entry Point
//!
//! Bootstraps configuration, connects PostgreSQL and Redis, and starts the
//! Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use gather_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState, AuthConfig};
use gather_api::mailer::{Mailer, SendGridMailer};
use gather_store::{
    DbConfig, PgCommentStore, PgPostStore, PgUserStore, RedisConfig, RedisUserCache, UserCache,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ApiConfig::from_env();
    let auth_config = AuthConfig::from_env();

    let db_config = DbConfig::from_env();
    let pool = db_config
        .create_pool()
        .map_err(|e| ApiError::internal_error(format!("Failed to create database pool: {}", e)))?;
    tracing::info!(host = %db_config.host, dbname = %db_config.dbname, "Database pool ready");

    let redis_config = RedisConfig::from_env();
    let user_cache: Option<Arc<dyn UserCache>> = if redis_config.enabled {
        let cache_pool = redis_config.create_pool().map_err(|e| {
            ApiError::internal_error(format!("Failed to create Redis pool: {}", e))
        })?;
        tracing::info!(url = %redis_config.url, "User cache enabled");
        Some(Arc::new(RedisUserCache::new(cache_pool)))
    } else {
        tracing::info!("User cache disabled");
        None
    };

    let mailer: Arc<dyn Mailer> = Arc::new(SendGridMailer::new(
        config.sendgrid_api_key.clone(),
        config.mail_from.clone(),
        !config.is_production(),
    ));

    let state = AppState::new(
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(PgPostStore::new(pool.clone())),
        Arc::new(PgCommentStore::new(pool)),
        user_cache,
        mailer,
        config.clone(),
        auth_config,
    );

    let _sweeper = state.limiter.spawn_sweeper();

    let app = create_api_router(state);

    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address: {}", e)))?;
    tracing::info!(%addr, env = %config.env, "Starting Gather API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
