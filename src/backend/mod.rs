pub mod memory;

use crate::errors::Result;
use async_trait::async_trait;

pub use memory::MemoryBackend;

/// Raw result of one atomic bucket check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    /// Whether the request was admitted.
    pub allowed: bool,

    /// Whole tokens left in the bucket after this check.
    pub remaining: u64,

    /// Seconds until at least one token is available; 0 when allowed, and 0
    /// on a denial that can never recover (zero refill rate).
    pub retry_after: u64,
}

/// Shared atomic-check primitive.
///
/// One call performs the entire refill-and-consume step for `key` as a single
/// indivisible operation against the backing store: no concurrent check on
/// the same key may observe an intermediate state. A check either completes
/// atomically or fails entirely; connectivity failures surface as
/// [`RateLimitError::BackendUnavailable`](crate::errors::RateLimitError) and
/// are never mapped to an allow or deny.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Run the token-bucket check for `key` at time `now` (Unix seconds).
    ///
    /// A missing or evicted bucket is treated as fresh and full. `capacity`
    /// may be 0, in which case the check always denies.
    async fn check(
        &self,
        key: &str,
        capacity: u64,
        refill_rate: f64,
        now: i64,
    ) -> Result<CheckOutcome>;
}

#[async_trait]
impl<T: Backend + ?Sized> Backend for std::sync::Arc<T> {
    async fn check(
        &self,
        key: &str,
        capacity: u64,
        refill_rate: f64,
        now: i64,
    ) -> Result<CheckOutcome> {
        (**self).check(key, capacity, refill_rate, now).await
    }
}
