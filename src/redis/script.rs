use crate::errors::{RateLimitError, Result};
use redis::Script;
use tracing::{debug, info};

/// Lua source of the atomic token-bucket check.
pub const TOKEN_BUCKET_SCRIPT: &str = include_str!("../../scripts/token_bucket.lua");

/// Load the token-bucket script into Redis and return its SHA.
///
/// SCRIPT LOAD is idempotent, so racing loads of the same source are
/// harmless: every call returns the same SHA.
pub async fn load_script<C: redis::aio::ConnectionLike>(conn: &mut C) -> Result<String> {
    debug!("Loading token bucket script into Redis...");

    let script = Script::new(TOKEN_BUCKET_SCRIPT);
    let sha = script
        .prepare_invoke()
        .load_async(conn)
        .await
        .map_err(|e| {
            RateLimitError::BackendUnavailable(format!("failed to load token bucket script: {}", e))
        })?;

    info!("Token bucket script loaded (SHA: {})", sha);
    Ok(sha)
}
