use thiserror::Error;

#[derive(Error, Debug)]
pub enum RateLimitError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Unexpected backend response: {0}")]
    BackendResponse(String),
}

impl RateLimitError {
    /// Stable label for metrics, one per variant.
    pub fn kind(&self) -> &'static str {
        match self {
            RateLimitError::Configuration(_) => "configuration",
            RateLimitError::InvalidIdentity(_) => "invalid_identity",
            RateLimitError::BackendUnavailable(_) => "backend_unavailable",
            RateLimitError::BackendResponse(_) => "backend_response",
        }
    }
}

/// Result type alias for rate limiter operations
pub type Result<T> = std::result::Result<T, RateLimitError>;
