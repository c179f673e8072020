//! Feed client error types.

use std::fmt;

/// Errors from the rail-data feed client.
#[derive(Debug)]
pub enum FeedError {
    /// HTTP request failed (network error, timeout, etc.)
    Http(reqwest::Error),

    /// JSON deserialization failed
    Json {
        message: String,
        body: Option<String>,
    },

    /// API returned an error status code, or an error object in the body
    ApiError { status: u16, message: String },

    /// Rate limited by the API
    RateLimited,

    /// Invalid API key or unauthorized
    Unauthorized,

    /// Feature not configured or not available
    NotConfigured(String),
}

impl FeedError {
    /// Returns true if retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::Http(_) | FeedError::RateLimited => true,
            FeedError::ApiError { status, .. } => *status >= 500 || *status == 0,
            FeedError::Json { .. } | FeedError::Unauthorized | FeedError::NotConfigured(_) => {
                false
            }
        }
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Http(e) => write!(f, "HTTP error: {e}"),
            FeedError::Json { message, body } => {
                write!(f, "JSON parse error: {message}")?;
                if let Some(body) = body {
                    write!(f, " (body: {body})")?;
                }
                Ok(())
            }
            FeedError::ApiError { status, message } => {
                write!(f, "API error {status}: {message}")
            }
            FeedError::RateLimited => write!(f, "rate limited by rail-data feed"),
            FeedError::Unauthorized => write!(f, "unauthorized (invalid API key)"),
            FeedError::NotConfigured(msg) => write!(f, "not configured: {msg}"),
        }
    }
}

impl std::error::Error for FeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FeedError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Http(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = FeedError::RateLimited;
        assert_eq!(err.to_string(), "rate limited by rail-data feed");

        let err = FeedError::ApiError {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert_eq!(err.to_string(), "API error 500: Internal Server Error");

        let err = FeedError::Json {
            message: "expected string".into(),
            body: Some("{}".into()),
        };
        assert!(err.to_string().contains("JSON parse error"));
        assert!(err.to_string().contains("expected string"));
    }

    #[test]
    fn retryable() {
        assert!(FeedError::RateLimited.is_retryable());
        assert!(
            FeedError::ApiError {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !FeedError::ApiError {
                status: 400,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!FeedError::Unauthorized.is_retryable());
    }
}
