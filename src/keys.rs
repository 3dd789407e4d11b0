use crate::errors::{RateLimitError, Result};

/// Maps a (caller, resource) pair to the string key of one bucket.
///
/// Builders must be deterministic: the same pair always yields the same key,
/// and different pairs yield different keys. Identities containing `:` can
/// make distinct pairs ambiguous (`a:b`/`c` vs `a`/`b:c`); callers that embed
/// colons in identities are expected to sanitize them first.
pub trait KeyBuilder: Send + Sync {
    fn build_key(&self, caller: &str, resource: &str) -> Result<String>;
}

/// Flat key builder: `prefix:caller:resource`.
#[derive(Debug, Clone)]
pub struct FlatKeyBuilder {
    prefix: String,
}

impl FlatKeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl KeyBuilder for FlatKeyBuilder {
    fn build_key(&self, caller: &str, resource: &str) -> Result<String> {
        Ok(format!("{}:{}:{}", self.prefix, caller, resource))
    }
}

/// Cluster-safe key builder: `prefix:{caller}:resource`.
///
/// The braces are a Redis Cluster hash tag, so every bucket belonging to one
/// caller hashes to the same slot. The resource stays in the key, keeping
/// per-resource buckets independent; only their slot placement is shared.
///
/// Caller identities containing `{` or `}` would corrupt the hash tag, so
/// they are rejected rather than escaped.
#[derive(Debug, Clone)]
pub struct ClusterSafeKeyBuilder {
    prefix: String,
}

impl ClusterSafeKeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl KeyBuilder for ClusterSafeKeyBuilder {
    fn build_key(&self, caller: &str, resource: &str) -> Result<String> {
        if caller.contains('{') || caller.contains('}') {
            return Err(RateLimitError::InvalidIdentity(format!(
                "caller identity '{}' contains hash tag delimiters",
                caller
            )));
        }

        Ok(format!("{}:{{{}}}:{}", self.prefix, caller, resource))
    }
}

impl<T: KeyBuilder + ?Sized> KeyBuilder for std::sync::Arc<T> {
    fn build_key(&self, caller: &str, resource: &str) -> Result<String> {
        (**self).build_key(caller, resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_key_format() {
        let builder = FlatKeyBuilder::new("rl");
        let key = builder.build_key("10.0.0.1", "/login").unwrap();
        assert_eq!(key, "rl:10.0.0.1:/login");
    }

    #[test]
    fn cluster_safe_key_wraps_caller_in_hash_tag() {
        let builder = ClusterSafeKeyBuilder::new("rl");
        let key = builder.build_key("10.0.0.1", "/login").unwrap();
        assert_eq!(key, "rl:{10.0.0.1}:/login");
    }

    #[test]
    fn builders_are_deterministic() {
        let flat = FlatKeyBuilder::new("rl");
        let cluster = ClusterSafeKeyBuilder::new("rl");

        assert_eq!(
            flat.build_key("c", "r").unwrap(),
            flat.build_key("c", "r").unwrap()
        );
        assert_eq!(
            cluster.build_key("c", "r").unwrap(),
            cluster.build_key("c", "r").unwrap()
        );
    }

    #[test]
    fn distinct_callers_get_distinct_keys() {
        let flat = FlatKeyBuilder::new("rl");
        let cluster = ClusterSafeKeyBuilder::new("rl");

        assert_ne!(
            flat.build_key("alice", "/r").unwrap(),
            flat.build_key("bob", "/r").unwrap()
        );
        assert_ne!(
            cluster.build_key("alice", "/r").unwrap(),
            cluster.build_key("bob", "/r").unwrap()
        );
    }

    #[test]
    fn distinct_resources_get_distinct_keys() {
        let cluster = ClusterSafeKeyBuilder::new("rl");
        assert_ne!(
            cluster.build_key("alice", "/a").unwrap(),
            cluster.build_key("alice", "/b").unwrap()
        );
    }

    #[test]
    fn cluster_safe_rejects_hash_tag_delimiters_in_caller() {
        let builder = ClusterSafeKeyBuilder::new("rl");
        let err = builder.build_key("evil{caller", "/r").unwrap_err();
        assert!(matches!(err, RateLimitError::InvalidIdentity(_)));

        let err = builder.build_key("evil}caller", "/r").unwrap_err();
        assert!(matches!(err, RateLimitError::InvalidIdentity(_)));
    }
}
