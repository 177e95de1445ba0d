use thiserror::Error;

/// Errors raised by cache stores and key helpers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend failed during `{op}`: {message}")]
    Backend { op: &'static str, message: String },
    #[error("invalid key pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("cache configuration error: {message}")]
    Configuration { message: String },
}

impl CacheError {
    pub fn backend(op: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Backend {
            op,
            message: error.to_string(),
        }
    }

    pub fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
