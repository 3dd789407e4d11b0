use crate::backend::Backend;
use crate::clock::Clock;
use crate::errors::{RateLimitError, Result};
use crate::keys::KeyBuilder;
use crate::metrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Outcome of one admission check, as handed to integration code.
///
/// Adapters turn `allowed = false` into their protocol's rejection (e.g. an
/// HTTP 429 carrying `retry_after` in a Retry-After header).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request is admitted.
    pub allowed: bool,

    /// Whole tokens left in the bucket after this check.
    pub remaining: u64,

    /// Seconds until a retry can succeed; `None` when no wait is needed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Orchestrates one admission decision per request.
///
/// Holds no mutable state of its own; all bucket state lives behind the
/// [`Backend`], so a single instance is safe to share across concurrent
/// callers.
pub struct RateLimiter<B: Backend, K: KeyBuilder, C: Clock> {
    backend: Arc<B>,
    key_builder: K,
    clock: C,
}

impl<B: Backend, K: KeyBuilder, C: Clock> RateLimiter<B, K, C> {
    pub fn new(backend: Arc<B>, key_builder: K, clock: C) -> Self {
        Self {
            backend,
            key_builder,
            clock,
        }
    }

    /// Decide whether to admit one request from `caller` against `resource`.
    ///
    /// `capacity` is the burst budget; it fully replenishes over
    /// `per_seconds`. Both must be positive or the call fails with a
    /// [`RateLimitError::Configuration`] (never clamped). Backend
    /// connectivity failures propagate as errors; the core takes no
    /// fail-open or fail-closed decision on its own.
    pub async fn allow(
        &self,
        caller: &str,
        resource: &str,
        capacity: u32,
        per_seconds: f64,
    ) -> Result<Decision> {
        if capacity == 0 {
            return Err(RateLimitError::Configuration(
                "capacity must be positive".to_string(),
            ));
        }
        if !per_seconds.is_finite() || per_seconds <= 0.0 {
            return Err(RateLimitError::Configuration(format!(
                "per_seconds must be positive, got {}",
                per_seconds
            )));
        }

        let refill_rate = f64::from(capacity) / per_seconds;
        let key = self.key_builder.build_key(caller, resource)?;
        let now = self.clock.now();

        debug!(
            caller,
            resource,
            key = %key,
            capacity,
            refill_rate,
            now,
            "checking rate limit"
        );

        let started = Instant::now();
        let outcome = match self
            .backend
            .check(&key, u64::from(capacity), refill_rate, now)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::record_backend_error(e.kind());
                return Err(e);
            }
        };
        metrics::record_check(outcome.allowed, started.elapsed().as_secs_f64());

        debug!(
            key = %key,
            allowed = outcome.allowed,
            remaining = outcome.remaining,
            retry_after = outcome.retry_after,
            "rate limit decision"
        );

        Ok(Decision {
            allowed: outcome.allowed,
            remaining: outcome.remaining,
            retry_after: match outcome.retry_after {
                0 => None,
                secs => Some(secs),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CheckOutcome, MemoryBackend};
    use crate::clock::ManualClock;
    use crate::keys::FlatKeyBuilder;
    use async_trait::async_trait;

    fn limiter(
        backend: Arc<MemoryBackend>,
        clock: Arc<ManualClock>,
    ) -> RateLimiter<MemoryBackend, FlatKeyBuilder, Arc<ManualClock>> {
        RateLimiter::new(backend, FlatKeyBuilder::new("rl"), clock)
    }

    #[tokio::test]
    async fn zero_capacity_is_a_configuration_error() {
        let limiter = limiter(
            Arc::new(MemoryBackend::new()),
            Arc::new(ManualClock::new(100)),
        );
        let err = limiter.allow("c", "/r", 0, 10.0).await.unwrap_err();
        assert!(matches!(err, RateLimitError::Configuration(_)));
    }

    #[tokio::test]
    async fn non_positive_window_is_a_configuration_error() {
        let limiter = limiter(
            Arc::new(MemoryBackend::new()),
            Arc::new(ManualClock::new(100)),
        );
        for per_seconds in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = limiter.allow("c", "/r", 5, per_seconds).await.unwrap_err();
            assert!(matches!(err, RateLimitError::Configuration(_)));
        }
    }

    #[tokio::test]
    async fn allowed_decision_has_no_retry_after() {
        let limiter = limiter(
            Arc::new(MemoryBackend::new()),
            Arc::new(ManualClock::new(100)),
        );
        let decision = limiter.allow("c", "/r", 5, 10.0).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
        assert_eq!(decision.retry_after, None);
    }

    #[tokio::test]
    async fn denied_decision_carries_retry_after() {
        let limiter = limiter(
            Arc::new(MemoryBackend::new()),
            Arc::new(ManualClock::new(100)),
        );
        for _ in 0..5 {
            assert!(limiter.allow("c", "/r", 5, 10.0).await.unwrap().allowed);
        }

        let decision = limiter.allow("c", "/r", 5, 10.0).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after, Some(2));
    }

    #[tokio::test]
    async fn clock_advance_refills_bucket() {
        let clock = Arc::new(ManualClock::new(100));
        let limiter = limiter(Arc::new(MemoryBackend::new()), clock.clone());

        for _ in 0..5 {
            assert!(limiter.allow("c", "/r", 5, 10.0).await.unwrap().allowed);
        }
        assert!(!limiter.allow("c", "/r", 5, 10.0).await.unwrap().allowed);

        clock.advance(2);
        let decision = limiter.allow("c", "/r", 5, 10.0).await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn invalid_identity_propagates_before_backend_call() {
        let limiter = RateLimiter::new(
            Arc::new(MemoryBackend::new()),
            crate::keys::ClusterSafeKeyBuilder::new("rl"),
            ManualClock::new(100),
        );
        let err = limiter.allow("bad{id", "/r", 5, 10.0).await.unwrap_err();
        assert!(matches!(err, RateLimitError::InvalidIdentity(_)));
    }

    struct FailingBackend;

    #[async_trait]
    impl Backend for FailingBackend {
        async fn check(&self, _: &str, _: u64, _: f64, _: i64) -> Result<CheckOutcome> {
            Err(RateLimitError::BackendUnavailable("store down".to_string()))
        }
    }

    #[tokio::test]
    async fn backend_failure_is_never_an_allow_or_deny() {
        let limiter = RateLimiter::new(
            Arc::new(FailingBackend),
            FlatKeyBuilder::new("rl"),
            ManualClock::new(100),
        );
        let err = limiter.allow("c", "/r", 5, 10.0).await.unwrap_err();
        assert!(matches!(err, RateLimitError::BackendUnavailable(_)));
    }

    #[test]
    fn decision_serializes_without_null_retry_after() {
        let decision = Decision {
            allowed: true,
            remaining: 3,
            retry_after: None,
        };
        let json = serde_json::to_string(&decision).unwrap();
        assert_eq!(json, r#"{"allowed":true,"remaining":3}"#);

        let decision = Decision {
            allowed: false,
            remaining: 0,
            retry_after: Some(2),
        };
        let json = serde_json::to_string(&decision).unwrap();
        assert_eq!(json, r#"{"allowed":false,"remaining":0,"retry_after":2}"#);
    }
}
