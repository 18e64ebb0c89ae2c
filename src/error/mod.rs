//! Error types for Parley.

pub mod unified;

pub use unified::{ErrorCategory, ErrorCode, ErrorDetails, RecoverySuggestion};

use thiserror::Error;

/// Maximum number of body characters carried inside an API error.
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Primary error type for all Parley operations.
#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        details: Option<ErrorDetails>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Generation service error: {0}")]
    Generation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Session produced no turns")]
    EmptySession,
}

impl ParleyError {
    /// Create an API error, truncating the body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: truncate_body(&message.into()),
            source: None,
            details: None,
        }
    }

    /// Create an API error with full details.
    pub fn api_with_details(
        status: u16,
        message: impl Into<String>,
        details: ErrorDetails,
    ) -> Self {
        Self::Api {
            status,
            message: truncate_body(&message.into()),
            source: None,
            details: Some(details),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(e) if e.is_timeout() => ErrorCategory::Timeout,
            Self::Network(e) if e.is_decode() => ErrorCategory::Malformed,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) | Self::ConfigParse(_) | Self::InvalidArgument(_) => {
                ErrorCategory::Configuration
            }
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::MalformedResponse(_) => ErrorCategory::Malformed,
            Self::Generation(_) => ErrorCategory::Generation,
            Self::Api { status, details, .. } => {
                if details
                    .as_ref()
                    .and_then(|d| d.code)
                    .is_some_and(|code| code == ErrorCode::InsufficientQuota)
                {
                    return ErrorCategory::Quota;
                }
                match status {
                    401 | 403 => ErrorCategory::Authentication,
                    402 => ErrorCategory::Quota,
                    408 => ErrorCategory::Timeout,
                    429 => ErrorCategory::RateLimit,
                    500..=599 => ErrorCategory::Server,
                    _ => ErrorCategory::Api,
                }
            }
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is transient and worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Whether this error rejects the caller's credentials.
    pub fn is_auth(&self) -> bool {
        self.category() == ErrorCategory::Authentication
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::Quota => RecoverySuggestion::CheckBilling,
            ErrorCategory::RateLimit => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Network => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Malformed => RecoverySuggestion::CheckBackendFormat,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Cut a response body down to [`MAX_ERROR_BODY_CHARS`] on a char boundary.
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ParleyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_status_maps_to_category() {
        assert_eq!(ParleyError::api(401, "nope").category(), ErrorCategory::Authentication);
        assert_eq!(ParleyError::api(403, "nope").category(), ErrorCategory::Authentication);
        assert_eq!(ParleyError::api(402, "pay").category(), ErrorCategory::Quota);
        assert_eq!(ParleyError::api(503, "busy").category(), ErrorCategory::Server);
        assert_eq!(ParleyError::api(404, "gone").category(), ErrorCategory::Api);
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(ParleyError::Timeout(10).is_retryable());
        assert!(ParleyError::api(502, "bad gateway").is_retryable());
        assert!(ParleyError::RateLimited { retry_after_ms: None }.is_retryable());
        assert!(!ParleyError::Authentication("bad key".into()).is_retryable());
        assert!(!ParleyError::Generation("down".into()).is_retryable());
        assert!(!ParleyError::api(400, "bad request").is_retryable());
    }

    #[test]
    fn quota_details_override_status() {
        let err = ParleyError::api_with_details(
            200,
            "unpaid bills",
            ErrorDetails {
                code: Some(ErrorCode::InsufficientQuota),
                provider_code: Some("4027".into()),
                param: None,
                request_id: None,
            },
        );
        assert_eq!(err.category(), ErrorCategory::Quota);
        assert_eq!(err.recovery_suggestion(), RecoverySuggestion::CheckBilling);
        assert!(!err.is_retryable());
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(2_000);
        match ParleyError::api(500, body) {
            ParleyError::Api { message, .. } => {
                assert_eq!(message.chars().count(), MAX_ERROR_BODY_CHARS + 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let body = "答".repeat(600);
        let cut = truncate_body(&body);
        assert!(cut.starts_with("答答"));
        assert!(cut.ends_with('…'));
    }
}
