//! Worker error types.
//!
//! Only job-fatal conditions live here. Unit-level failures inside the
//! detection and validation stages are `policy::SkipUnit` values and never
//! reach this enum.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("No session record found for {0}")]
    MissingSession(String),

    #[error("Uploaded media never became ready: {0}")]
    MediaNotReady(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] bwatch_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] bwatch_media::MediaError),

    #[error("Inference error: {0}")]
    Inference(#[from] bwatch_inference::InferenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn missing_session(msg: impl Into<String>) -> Self {
        Self::MissingSession(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
