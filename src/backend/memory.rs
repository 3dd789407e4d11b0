use crate::backend::{Backend, CheckOutcome};
use crate::errors::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

/// One bucket's stored state. Tokens are fractional internally; only the
/// reported remaining count is floored.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: i64,
}

/// In-process backend over a sharded concurrent map.
///
/// Intended for single-process deployments and deterministic tests. The
/// atomicity contract is met by per-key mutual exclusion: the map's entry API
/// holds the shard write lock for the whole refill-and-consume step, so
/// checks on one key are serialized while checks on other keys proceed.
///
/// Buckets are never evicted here; a process restart is the moral equivalent
/// of the shared store's TTL eviction (every bucket resets to full).
#[derive(Debug, Default)]
pub struct MemoryBackend {
    buckets: DashMap<String, Bucket>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live buckets, for observability.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn check(
        &self,
        key: &str,
        capacity: u64,
        refill_rate: f64,
        now: i64,
    ) -> Result<CheckOutcome> {
        // The entry guard holds the shard write lock; keep its scope to the
        // bucket mutation only.
        let outcome = {
            let mut entry = self
                .buckets
                .entry(key.to_string())
                .or_insert(Bucket {
                    tokens: capacity as f64,
                    last_refill: now,
                });
            let bucket = entry.value_mut();

            // Clock skew between processes can make `now` lag the stored
            // timestamp; never refill backwards.
            let elapsed = (now - bucket.last_refill).max(0) as f64;
            bucket.tokens = (bucket.tokens + elapsed * refill_rate).min(capacity as f64);
            bucket.last_refill = now;

            if bucket.tokens >= 1.0 {
                bucket.tokens -= 1.0;
                CheckOutcome {
                    allowed: true,
                    remaining: bucket.tokens.floor() as u64,
                    retry_after: 0,
                }
            } else {
                let retry_after = if refill_rate > 0.0 {
                    ((1.0 - bucket.tokens) / refill_rate).ceil() as u64
                } else {
                    0
                };
                CheckOutcome {
                    allowed: false,
                    remaining: 0,
                    retry_after,
                }
            }
        };

        debug!(
            key,
            allowed = outcome.allowed,
            remaining = outcome.remaining,
            retry_after = outcome.retry_after,
            "memory backend check"
        );

        Ok(outcome)
    }
}
