use thiserror::Error;

/// Errors raised by the HTTP collaborators.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("no active session")]
    MissingSession,
}

impl ClientError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http(_) => true,
            ClientError::Api { status, .. } => *status >= 500 || *status == 429,
            ClientError::Json(_) | ClientError::Unauthorized(_) | ClientError::MissingSession => false,
        }
    }
}
