// Recognition Provider Error Types

/// Provider-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("No such entity")]
    NotFound,

    #[error("Provider API error: {0}")]
    ApiError(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether retrying the same call could succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_) | Self::RateLimited)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(err.to_string())
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::ApiError(err.to_string())
        }
    }
}

impl From<ProviderError> for crate::Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Network(msg) | ProviderError::Timeout(msg) => Self::Transient(msg),
            ProviderError::RateLimited => {
                Self::Transient("Rate limited by provider".to_string())
            }
            ProviderError::NotFound => Self::Permanent("No such entity".to_string()),
            other => Self::Permanent(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout("t".to_string()).is_transient());
        assert!(ProviderError::Network("n".to_string()).is_transient());
        assert!(ProviderError::RateLimited.is_transient());
        assert!(!ProviderError::NotFound.is_transient());
        assert!(!ProviderError::ApiError("a".to_string()).is_transient());
    }

    #[test]
    fn test_conversion_to_core_error() {
        let err: crate::Error = ProviderError::Timeout("slow".to_string()).into();
        assert!(err.is_retryable());

        let err: crate::Error = ProviderError::NotFound.into();
        assert!(matches!(err, crate::Error::Permanent(_)));
    }
}
