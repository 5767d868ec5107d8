//! Inference error types and throttle/transient classification.

use thiserror::Error;

/// Result type for inference operations.
pub type InferenceResult<T> = Result<T, InferenceError>;

/// Errors from the generative-model backend.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Failed to configure inference client: {0}")]
    ConfigError(String),

    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Media upload failed: {0}")]
    UploadFailed(String),

    #[error("Backend returned no candidates")]
    EmptyResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InferenceError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Numeric status carried by the backend, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Quota/throttle signal: HTTP 429 or the backend's quota wording.
    pub fn is_rate_limited(&self) -> bool {
        if self.status() == Some(429) {
            return true;
        }
        let message = self.to_string().to_lowercase();
        message.contains("resource_exhausted") || message.contains("rate limit")
    }

    /// Transient backend failure worth a retry after a pause.
    pub fn is_transient(&self) -> bool {
        if matches!(self.status(), Some(status) if status >= 500) {
            return true;
        }
        if matches!(self, Self::Transport(_)) {
            return true;
        }
        let message = self.to_string().to_lowercase();
        message.contains("internal")
            || message.contains("unavailable")
            || message.contains("deadline exceeded")
    }
}

impl From<reqwest::Error> for InferenceError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
