//! Gemini REST client.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{InferenceError, InferenceResult};
use crate::types::{FileState, GenerateRequest, InferenceBackend, MediaHandle};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    client: Client,
}

/// Gemini generateContent request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_metadata: Option<VideoMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    file_uri: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    start_offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_offset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fps: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

/// Gemini generateContent response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Wrapper around the File resource in upload responses.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: WireFile,
}

#[derive(Debug, Deserialize)]
struct WireFile {
    name: String,
    #[serde(default)]
    uri: Option<String>,
    state: FileState,
}

impl From<WireFile> for MediaHandle {
    fn from(file: WireFile) -> Self {
        MediaHandle {
            name: file.name,
            uri: file.uri,
            state: file.state,
        }
    }
}

/// Structured error body the API returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// google.protobuf.Duration wire format, e.g. `26.000s`.
fn format_offset(seconds: f64) -> String {
    format!("{:.3}s", seconds)
}

impl GeminiClient {
    /// Create a new client from `GEMINI_API_KEY`.
    pub fn from_env() -> InferenceResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| InferenceError::config_error("GEMINI_API_KEY not set"))?;
        Ok(Self::new(api_key, DEFAULT_BASE_URL))
    }

    /// Create a client against an explicit base URL (tests point this at a
    /// local mock server).
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    /// Map a non-success response to an `Api` error carrying the backend's
    /// status code and message.
    async fn error_from_response(response: reqwest::Response) -> InferenceError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => match parsed.error.status {
                Some(code) => format!("{}: {}", code, parsed.error.message),
                None => parsed.error.message,
            },
            Err(_) => body,
        };
        InferenceError::api(status, message)
    }
}

#[async_trait]
impl InferenceBackend for GeminiClient {
    async fn upload_media(&self, path: &Path, mime_type: &str) -> InferenceResult<MediaHandle> {
        let url = format!(
            "{}/upload/v1beta/files?key={}",
            self.base_url, self.api_key
        );

        debug!("Uploading {} to Gemini files API", path.display());

        let bytes = tokio::fs::read(path).await?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        let response = self
            .client
            .post(&url)
            .header("X-Goog-Upload-Protocol", "raw")
            .header("X-Goog-File-Name", display_name)
            .header("Content-Type", mime_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::UploadFailed(e.to_string()))?;

        Ok(upload.file.into())
    }

    async fn get_media(&self, name: &str) -> InferenceResult<MediaHandle> {
        let url = format!(
            "{}/v1beta/{}?key={}",
            self.base_url,
            name.trim_start_matches('/'),
            self.api_key
        );

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let file: WireFile = response.json().await?;
        Ok(file.into())
    }

    async fn generate(&self, request: &GenerateRequest) -> InferenceResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, request.model, self.api_key
        );

        let body = GeminiRequest {
            contents: vec![Content {
                parts: vec![
                    Part {
                        file_data: Some(FileData {
                            file_uri: request.media.uri.clone(),
                            mime_type: request.media.mime_type.clone(),
                        }),
                        video_metadata: Some(VideoMetadata {
                            start_offset: request.media.start_offset_sec.map(format_offset),
                            end_offset: request.media.end_offset_sec.map(format_offset),
                            fps: request.media.fps,
                        }),
                        text: None,
                    },
                    Part {
                        file_data: None,
                        video_metadata: None,
                        text: Some(request.prompt.clone()),
                    },
                ],
            }],
            generation_config: WireGenerationConfig {
                temperature: request.config.temperature,
                response_mime_type: request.config.response_mime_type.clone(),
                response_schema: request.config.response_schema.clone(),
            },
        };

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let parsed: GeminiResponse = response.json().await?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .ok_or(InferenceError::EmptyResponse)
    }
}
