use thiserror::Error;

/// Errors classified by kind so adapters can distinguish "not found" from
/// "rate limited" from "malformed", per C1's contract.
#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("transient error (status {status}): {message}")]
    Transient { status: u16, message: String },

    #[error("rate limited (429){}", retry_after.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    #[error("permanent error (status {status}): {message}")]
    Permanent { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("network error: {0}")]
    Network(String),
}

impl ApiError {
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => ApiError::RateLimited { retry_after: None },
            500 | 502 | 503 | 504 => ApiError::Transient {
                status,
                message: format!("server error {status}"),
            },
            404 => ApiError::Permanent {
                status,
                message: "not found".to_string(),
            },
            401 | 403 => ApiError::Permanent {
                status,
                message: "unauthorized or forbidden".to_string(),
            },
            s => ApiError::Permanent {
                status: s,
                message: format!("unexpected status {s}"),
            },
        }
    }

    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            ApiError::Network(err.to_string())
        } else {
            ApiError::Malformed(err.to_string())
        }
    }

    /// Whether this error class is worth retrying: connection/timeout, 429,
    /// or 5xx. Non-transient 4xx are returned to the caller immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Transient { .. } | ApiError::RateLimited { .. } | ApiError::Network(_)
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }
}
