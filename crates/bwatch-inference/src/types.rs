//! Backend contract types.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::InferenceResult;

/// Lifecycle state of uploaded media on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    Processing,
    Active,
    Error,
}

/// A handle to media uploaded to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaHandle {
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
    pub state: FileState,
}

impl MediaHandle {
    pub fn is_active(&self) -> bool {
        self.state == FileState::Active
    }
}

/// Reference to uploaded media within a generation request, restricted to a
/// window of the video and downsampled to an effective frame rate.
#[derive(Debug, Clone)]
pub struct MediaRef {
    pub uri: String,
    pub mime_type: String,
    pub start_offset_sec: Option<f64>,
    pub end_offset_sec: Option<f64>,
    pub fps: Option<f64>,
}

/// Generation parameters.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub temperature: f64,
    pub response_mime_type: Option<String>,
    pub response_schema: Option<serde_json::Value>,
}

impl GenerationConfig {
    /// Strict JSON output with a response schema.
    pub fn json(temperature: f64, schema: serde_json::Value) -> Self {
        Self {
            temperature,
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(schema),
        }
    }
}

/// One multimodal generation request: a media window plus a text prompt.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub media: MediaRef,
    pub prompt: String,
    pub config: GenerationConfig,
}

/// The inference capability set the worker is written against.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Upload local media; the returned handle is typically still `PROCESSING`.
    async fn upload_media(&self, path: &Path, mime_type: &str) -> InferenceResult<MediaHandle>;

    /// Re-fetch an uploaded media handle by name.
    async fn get_media(&self, name: &str) -> InferenceResult<MediaHandle>;

    /// Run one generation call, returning the first candidate's text.
    async fn generate(&self, request: &GenerateRequest) -> InferenceResult<String>;
}
