use crate::clock::SystemClock;
use crate::errors::Result;
use crate::keys::ClusterSafeKeyBuilder;
use crate::limiter::RateLimiter;
use crate::redis::{RedisBackend, RedisBackendConfig};
use std::sync::Arc;

/// Build a rate limiter with the common production wiring: Redis backend,
/// cluster-safe keys, system clock.
///
/// ```no_run
/// use tokengate::{factory, RedisBackendConfig};
///
/// # async fn run() -> tokengate::Result<()> {
/// let limiter = factory::redis_rate_limiter(RedisBackendConfig::default(), "rl").await?;
/// let decision = limiter.allow("10.0.0.1", "/login", 5, 10.0).await?;
/// assert!(decision.allowed);
/// # Ok(())
/// # }
/// ```
///
/// For a custom backend, key strategy, or clock, construct
/// [`RateLimiter`] directly.
pub async fn redis_rate_limiter(
    config: RedisBackendConfig,
    prefix: impl Into<String>,
) -> Result<RateLimiter<RedisBackend, ClusterSafeKeyBuilder, SystemClock>> {
    let backend = RedisBackend::connect(config).await?;
    Ok(RateLimiter::new(
        Arc::new(backend),
        ClusterSafeKeyBuilder::new(prefix),
        SystemClock,
    ))
}
