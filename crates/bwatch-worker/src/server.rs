//! Push-subscription HTTP intake.
//!
//! The endpoint unwraps the subscription envelope, hands the decoded storage
//! event to the processor, and maps job failures to 500 so the subscription
//! redelivers. Intentional no-ops are acknowledged with 200 and a reason
//! code so the subscription never retries them.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::warn;

use bwatch_models::StorageEvent;

use crate::processor::{JobProcessor, ProcessOutcome};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<JobProcessor>,
    pub api_token: Option<String>,
}

/// Create the worker router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let mut router = Router::new()
        .route("/pubsub/storage-finalize", post(storage_finalize))
        .route("/healthz", get(healthz))
        .route("/health", get(healthz));

    if let Some(handle) = metrics_handle {
        router = router.route("/metrics", get(move || async move { handle.render() }));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({"ok": true}))
}

/// A push-subscription envelope.
#[derive(Debug, Deserialize)]
struct PushEnvelope {
    message: PushMessage,
}

#[derive(Debug, Default, Deserialize)]
struct PushMessage {
    /// base64-encoded JSON event payload
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

/// Decode the event from the base64 payload, falling back to the message
/// attributes for missing fields.
fn decode_event(envelope: &PushEnvelope) -> Option<StorageEvent> {
    let payload: Option<serde_json::Value> = envelope
        .message
        .data
        .as_ref()
        .and_then(|data| base64::engine::general_purpose::STANDARD.decode(data).ok())
        .and_then(|bytes| serde_json::from_slice(&bytes).ok());

    let payload_field = |names: &[&str]| {
        payload.as_ref().and_then(|value| {
            names
                .iter()
                .find_map(|name| value.get(name).and_then(|v| v.as_str()))
                .map(str::to_string)
        })
    };
    let attribute = |name: &str| envelope.message.attributes.get(name).cloned();

    let event_type = payload_field(&["eventType"]).or_else(|| attribute("eventType"))?;
    let bucket_name = payload_field(&["bucket", "bucketId"])
        .or_else(|| attribute("bucketId"))
        .unwrap_or_default();
    let object_name = payload_field(&["name", "objectId"]).or_else(|| attribute("objectId"))?;

    Some(StorageEvent {
        event_type,
        bucket_name,
        object_name,
    })
}

async fn storage_finalize(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(envelope): Json<PushEnvelope>,
) -> Response {
    if let Some(token) = &state.api_token {
        let expected = format!("Bearer {token}");
        let presented = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": "Unauthorized"})),
            )
                .into_response();
        }
    }

    let Some(event) = decode_event(&envelope) else {
        warn!("Envelope carried no decodable storage event");
        return Json(json!({"ignored": true, "reason": "invalid_envelope"})).into_response();
    };

    match state.processor.process_event(&event).await {
        Ok(ProcessOutcome::Processed {
            icd_key,
            upload_epoch,
            behavior_count,
        }) => Json(json!({
            "ok": true,
            "icdKey": icd_key,
            "uploadEpoch": upload_epoch,
            "behaviors": behavior_count,
        }))
        .into_response(),
        Ok(ProcessOutcome::Ignored { reason }) => {
            Json(json!({"ignored": true, "reason": reason})).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "processing failed", "error": e.to_string()})),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(data: Option<serde_json::Value>, attributes: &[(&str, &str)]) -> PushEnvelope {
        PushEnvelope {
            message: PushMessage {
                data: data.map(|value| {
                    base64::engine::general_purpose::STANDARD
                        .encode(serde_json::to_vec(&value).unwrap())
                }),
                attributes: attributes
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        }
    }

    #[test]
    fn test_decode_from_payload() {
        let event = decode_event(&envelope(
            Some(json!({
                "eventType": "OBJECT_FINALIZE",
                "bucket": "media",
                "name": "child-videos/icd-abc/1234-a.mp4"
            })),
            &[],
        ))
        .unwrap();
        assert_eq!(event.event_type, "OBJECT_FINALIZE");
        assert_eq!(event.bucket_name, "media");
        assert_eq!(event.object_name, "child-videos/icd-abc/1234-a.mp4");
    }

    #[test]
    fn test_decode_accepts_id_field_variants() {
        let event = decode_event(&envelope(
            Some(json!({
                "eventType": "OBJECT_FINALIZE",
                "bucketId": "media",
                "objectId": "child-videos/icd-abc/1.mp4"
            })),
            &[],
        ))
        .unwrap();
        assert_eq!(event.bucket_name, "media");
        assert_eq!(event.object_name, "child-videos/icd-abc/1.mp4");
    }

    #[test]
    fn test_decode_falls_back_to_attributes() {
        let event = decode_event(&envelope(
            None,
            &[
                ("eventType", "OBJECT_FINALIZE"),
                ("bucketId", "media"),
                ("objectId", "child-videos/icd-abc/1.mp4"),
            ],
        ))
        .unwrap();
        assert_eq!(event.object_name, "child-videos/icd-abc/1.mp4");
    }

    #[test]
    fn test_decode_mixes_payload_and_attributes() {
        // payload missing the object name, attributes carry it
        let event = decode_event(&envelope(
            Some(json!({"eventType": "OBJECT_FINALIZE"})),
            &[("objectId", "child-videos/icd-abc/2.mp4")],
        ))
        .unwrap();
        assert_eq!(event.object_name, "child-videos/icd-abc/2.mp4");
    }

    #[test]
    fn test_decode_rejects_empty_envelope() {
        assert!(decode_event(&envelope(None, &[])).is_none());
        assert!(decode_event(&envelope(Some(json!({"name": "x"})), &[])).is_none());
    }
}
