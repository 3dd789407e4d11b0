use crate::errors::{RateLimitError, Result};
use deadpool::managed::PoolConfig as DeadpoolPoolConfig;
use deadpool_redis::{Config as DeadpoolRedisConfig, Pool, Runtime};
use tracing::{debug, info};

/// Connection settings for the Redis backend.
///
/// Filled in by the integrating application; the core reads no environment
/// variables or files.
#[derive(Debug, Clone)]
pub struct RedisBackendConfig {
    /// Redis URL (e.g., "redis://localhost:6379")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: usize,
}

impl Default for RedisBackendConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            max_connections: 50,
        }
    }
}

/// Create a Redis connection pool and verify it with a PING.
pub async fn create_redis_pool(config: &RedisBackendConfig) -> Result<Pool> {
    info!("Creating Redis connection pool...");

    let mut cfg = DeadpoolRedisConfig::from_url(config.url.clone());
    cfg.pool = Some(DeadpoolPoolConfig::new(config.max_connections));

    let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
        RateLimitError::BackendUnavailable(format!("pool creation failed: {}", e))
    })?;

    info!(
        "Redis connection pool created (max_connections: {})",
        config.max_connections
    );

    debug!("Testing Redis connection...");
    let mut conn = pool.get().await.map_err(|e| {
        RateLimitError::BackendUnavailable(format!("failed to get connection: {}", e))
    })?;

    let _pong: String = redis::cmd("PING")
        .query_async(&mut *conn)
        .await
        .map_err(|e| RateLimitError::BackendUnavailable(format!("PING failed: {}", e)))?;

    info!("Redis connection test successful");

    Ok(pool)
}
