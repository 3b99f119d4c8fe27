//! Provider-side error taxonomy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Upstream API rejected the request
    #[error("API error ({error_type}): {message}")]
    Api { error_type: String, message: String },

    /// Upstream rate limit hit
    #[error("rate limited, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Consultation was aborted by the caller
    #[error("consultation aborted")]
    Aborted,

    /// Provider returned something the adapter could not interpret
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Stream broke mid-consultation
    #[error("stream error: {0}")]
    Stream(String),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the same consultation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Stream(_) => true,
            Self::Api { error_type, .. } => {
                matches!(error_type.as_str(), "overloaded_error" | "server_error")
            }
            _ => false,
        }
    }
}
