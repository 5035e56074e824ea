//! Provider error taxonomy
//!
//! Classification drives the worker retry policy: transient-infra and
//! throttling retry with backoff, provider rejections fail the task
//! immediately.

use thiserror::Error;

/// Provider API error
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Request deadline exceeded
    #[error("Request timed out")]
    Timeout,

    /// Network-level failure (DNS, connect, reset)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider throttling (HTTP 429)
    #[error("Throttled by provider (retry after {retry_after_secs:?}s)")]
    Throttled { retry_after_secs: Option<u64> },

    /// Provider-side failure (HTTP 5xx)
    #[error("Provider server error: HTTP {0}")]
    Server(u16),

    /// Provider rejection (validation, stock gone, permissions); terminal
    #[error("Provider rejected request: {code} {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether the worker may retry this failure with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout
                | ProviderError::Transport(_)
                | ProviderError::Throttled { .. }
                | ProviderError::Server(_)
        )
    }

    /// Short code for attempt records (`429`, `503`, provider code, ...)
    pub fn short_code(&self) -> String {
        match self {
            ProviderError::Timeout => "timeout".into(),
            ProviderError::Transport(_) => "transport".into(),
            ProviderError::Throttled { .. } => "429".into(),
            ProviderError::Server(status) => status.to_string(),
            ProviderError::Rejected { code, .. } => code.clone(),
            ProviderError::Decode(_) => "decode".into(),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::Transport("reset".into()).is_retryable());
        assert!(ProviderError::Throttled { retry_after_secs: None }.is_retryable());
        assert!(ProviderError::Server(503).is_retryable());
        assert!(
            !ProviderError::Rejected {
                status: 400,
                code: "INVALID_CONFIGURATION".into(),
                message: "bad option".into(),
            }
            .is_retryable()
        );
        assert!(!ProviderError::Decode("eof".into()).is_retryable());
    }
}
