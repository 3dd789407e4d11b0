pub mod pool;
pub mod script;

use crate::backend::{Backend, CheckOutcome};
use crate::errors::{RateLimitError, Result};
use crate::metrics;
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use deadpool_redis::Pool;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub use pool::{create_redis_pool, RedisBackendConfig};

/// Redis-backed atomic-check backend.
///
/// The token-bucket routine runs server-side as a Lua script, so the whole
/// refill-and-consume step is one indivisible operation per key. The script
/// SHA is held as a lazily installed capability: it is loaded on first use
/// and reloaded once if Redis reports NOSCRIPT (script cache lost, e.g.
/// after a restart). Only a failed reload or a second execution failure
/// surfaces to the caller, as `BackendUnavailable`.
pub struct RedisBackend {
    pool: Arc<Pool>,
    script_sha: ArcSwapOption<String>,
}

impl RedisBackend {
    /// Connect to Redis and eagerly install the check script.
    pub async fn connect(config: RedisBackendConfig) -> Result<Self> {
        let pool = pool::create_redis_pool(&config).await?;
        let backend = Self::with_pool(pool);

        let mut conn = backend.get_conn().await?;
        let sha = script::load_script(&mut *conn).await?;
        backend.script_sha.store(Some(Arc::new(sha)));

        Ok(backend)
    }

    /// Wrap an existing pool. The script is installed lazily on first check.
    pub fn with_pool(pool: Pool) -> Self {
        Self {
            pool: Arc::new(pool),
            script_sha: ArcSwapOption::empty(),
        }
    }

    /// Verify the store is reachable.
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get_conn().await?;

        let response: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| RateLimitError::BackendUnavailable(format!("PING failed: {}", e)))?;

        if response != "PONG" {
            return Err(RateLimitError::BackendResponse(format!(
                "unexpected PING response: {}",
                response
            )));
        }

        Ok(())
    }

    async fn get_conn(&self) -> Result<deadpool_redis::Connection> {
        self.pool.get().await.map_err(|e| {
            error!("Failed to get Redis connection: {}", e);
            RateLimitError::BackendUnavailable(format!("connection pool: {}", e))
        })
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn check(
        &self,
        key: &str,
        capacity: u64,
        refill_rate: f64,
        now: i64,
    ) -> Result<CheckOutcome> {
        let mut conn = self.get_conn().await?;

        debug!(key, capacity, refill_rate, now, "executing token bucket script");

        let values = run_check(&mut *conn, &self.script_sha, key, capacity, refill_rate, now).await?;
        parse_outcome(&values)
    }
}

/// Return the installed script SHA, loading the script if necessary.
/// Racing installs overwrite each other with an identical SHA.
async fn ensure_script<C: redis::aio::ConnectionLike>(
    conn: &mut C,
    cache: &ArcSwapOption<String>,
) -> Result<Arc<String>> {
    if let Some(sha) = cache.load_full() {
        return Ok(sha);
    }

    let sha = Arc::new(script::load_script(conn).await?);
    cache.store(Some(sha.clone()));
    Ok(sha)
}

async fn invoke<C: redis::aio::ConnectionLike>(
    conn: &mut C,
    sha: &str,
    key: &str,
    capacity: u64,
    refill_rate: f64,
    now: i64,
) -> redis::RedisResult<Vec<redis::Value>> {
    redis::cmd("EVALSHA")
        .arg(sha)
        .arg(1)
        .arg(key)
        .arg(capacity)
        .arg(refill_rate)
        .arg(now)
        .query_async(conn)
        .await
}

/// Execute one check, recovering from a lost script cache at most once.
async fn run_check<C: redis::aio::ConnectionLike>(
    conn: &mut C,
    script_sha: &ArcSwapOption<String>,
    key: &str,
    capacity: u64,
    refill_rate: f64,
    now: i64,
) -> Result<Vec<redis::Value>> {
    let sha = ensure_script(conn, script_sha).await?;

    let values = match invoke(conn, &sha, key, capacity, refill_rate, now).await {
        Ok(values) => values,
        Err(e) if e.kind() == redis::ErrorKind::NoScriptError => {
            // Redis restarted and dropped its script cache. Reinstall and
            // retry exactly once.
            warn!("Token bucket script missing from Redis, reloading");
            metrics::record_script_reload();

            script_sha.store(None);
            let sha = ensure_script(conn, script_sha).await?;

            invoke(conn, &sha, key, capacity, refill_rate, now)
                .await
                .map_err(|e| {
                    error!("Script execution failed after reload: {}", e);
                    metrics::record_script_execution(false);
                    RateLimitError::BackendUnavailable(format!(
                        "script execution failed after reload: {}",
                        e
                    ))
                })?
        }
        Err(e) => {
            error!("Script execution failed: {}", e);
            metrics::record_script_execution(false);
            return Err(RateLimitError::BackendUnavailable(format!(
                "script execution failed: {}",
                e
            )));
        }
    };

    metrics::record_script_execution(true);
    Ok(values)
}

/// Parse the script reply: `[allowed 0|1, remaining, retry_after]`.
fn parse_outcome(values: &[redis::Value]) -> Result<CheckOutcome> {
    if values.len() != 3 {
        return Err(RateLimitError::BackendResponse(format!(
            "invalid script response length: {}",
            values.len()
        )));
    }

    let as_int = |value: &redis::Value, field: &str| -> Result<i64> {
        match value {
            redis::Value::Int(v) => Ok(*v),
            other => Err(RateLimitError::BackendResponse(format!(
                "invalid {} value type: {:?}",
                field, other
            ))),
        }
    };

    let allowed = as_int(&values[0], "allowed")? == 1;
    let remaining = as_int(&values[1], "remaining")?.max(0) as u64;
    let retry_after = as_int(&values[2], "retry_after")?.max(0) as u64;

    Ok(CheckOutcome {
        allowed,
        remaining,
        retry_after,
    })
}
