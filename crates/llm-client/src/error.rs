use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Empty response from model service")]
    EmptyResponse,

    #[error("Timeout")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LlmError {
    /// Transient failures (network, 5xx, timeouts) are retried with backoff;
    /// everything else is surfaced immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RequestFailed(e) => {
                e.is_timeout() || e.is_connect() || e.status().map(|s| s.is_server_error()).unwrap_or(true)
            }
            LlmError::ServiceUnavailable(_) | LlmError::Timeout => true,
            LlmError::InvalidRequest(_) | LlmError::EmptyResponse | LlmError::Serialization(_) => {
                false
            }
        }
    }
}

pub type LlmResult<T> = Result<T, LlmError>;
