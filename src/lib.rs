pub mod backend;
pub mod clock;
pub mod errors;
pub mod factory;
pub mod keys;
pub mod limiter;
pub mod metrics;
pub mod redis;

// Re-export commonly used types
pub use backend::{Backend, CheckOutcome, MemoryBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{RateLimitError, Result};
pub use keys::{ClusterSafeKeyBuilder, FlatKeyBuilder, KeyBuilder};
pub use limiter::{Decision, RateLimiter};
pub use redis::{RedisBackend, RedisBackendConfig};
