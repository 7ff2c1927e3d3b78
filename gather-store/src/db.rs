//! Database connection pool configuration.
//!
//! PostgreSQL connection pooling via deadpool-postgres. Every statement the
//! stores issue is individually bounded by [`QUERY_TIMEOUT`]; a statement
//! that exceeds it surfaces as [`StoreError::Timeout`] and is not retried.

use crate::error::{StoreError, StoreResult};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use std::future::Future;
use std::time::Duration;
use tokio_postgres::NoTls;

/// Per-statement timeout applied by all store operations.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub max_size: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "gather".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("GATHER_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("GATHER_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("GATHER_DB_NAME").unwrap_or_else(|_| "gather".to_string()),
            user: std::env::var("GATHER_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("GATHER_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("GATHER_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> StoreResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(self.max_size));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Pool(format!("failed to create pool: {e}")))?;

        Ok(pool)
    }
}

/// Run a single statement future under [`QUERY_TIMEOUT`].
pub(crate) async fn with_timeout<T, F>(fut: F) -> StoreResult<T>
where
    F: Future<Output = Result<T, tokio_postgres::Error>>,
{
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(res) => res.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout),
    }
}
