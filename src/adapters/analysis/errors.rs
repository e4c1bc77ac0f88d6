use reqwest::StatusCode;
use thiserror::Error;

/// Failures of a single chat completions call.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// Invalid or missing API key (HTTP 401/403)
    #[error("authentication failed ({0})")]
    Unauthorized(StatusCode),

    /// Rate limit exceeded (HTTP 429)
    #[error("rate limit exceeded")]
    RateLimited,

    /// Server-side failure (HTTP 5xx)
    #[error("server error ({0}): {1}")]
    ServerError(StatusCode, String),

    /// Any other non-success status
    #[error("request rejected ({0}): {1}")]
    Rejected(StatusCode, String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A successful response with no message content
    #[error("empty completion")]
    EmptyResponse,
}

impl CompletionError {
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized(status),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            s if s.is_server_error() => Self::ServerError(s, body),
            s => Self::Rejected(s, body),
        }
    }

    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError(..) | Self::Network(_) | Self::EmptyResponse
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(CompletionError::from_status(StatusCode::BAD_GATEWAY, String::new()).is_transient());
        assert!(CompletionError::from_status(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(CompletionError::EmptyResponse.is_transient());

        let unauthorized = CompletionError::from_status(StatusCode::UNAUTHORIZED, String::new());
        assert!(matches!(unauthorized, CompletionError::Unauthorized(_)));
        assert!(!unauthorized.is_transient());
        assert!(!CompletionError::from_status(StatusCode::BAD_REQUEST, "bad".into()).is_transient());
    }
}
