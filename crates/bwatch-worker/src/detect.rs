//! Detection stage: per-segment behavior extraction.

use serde::Deserialize;
use tracing::{debug, warn};

use bwatch_inference::{GenerateRequest, GenerationConfig, InferenceBackend, MediaRef};
use bwatch_models::{Behavior, Detection, Modality, Segment};

use crate::merge::round3;
use crate::metrics::names;
use crate::policy::{call_with_policy, CallPolicy};
use crate::pool::run_bounded;
use crate::prompts::{detection_prompt, detection_response_schema, STRICT_JSON_REMINDER};
use crate::rate_limit::RateLimitController;

/// Temperature of the strict-JSON retry after an unparseable response.
const STRICT_RETRY_TEMPERATURE: f64 = 0.0;

/// One item as the model reports it, before normalization.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetection {
    #[serde(default)]
    pub behavior: String,
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default)]
    pub start_sec: Option<f64>,
    #[serde(default)]
    pub end_sec: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Everything a detection worker needs, shared across the pool.
pub struct DetectionDeps<'a> {
    pub backend: &'a dyn InferenceBackend,
    pub limiter: &'a RateLimitController,
    pub policy: &'a CallPolicy,
    pub model: &'a str,
    pub media_uri: &'a str,
    pub media_mime: &'a str,
    /// Effective clip fps, already capped at the configured maximum.
    pub fps: Option<f64>,
    pub temperature: f64,
    pub min_duration: f64,
}

/// Run detection over all segments under the bounded pool. The result
/// preserves segment order; a skipped segment contributes an empty list.
pub async fn run_detection_stage(
    deps: &DetectionDeps<'_>,
    segments: &[Segment],
    concurrency: usize,
) -> Vec<Detection> {
    let per_segment = run_bounded(concurrency, segments.to_vec(), |segment, index| async move {
        detect_segment(deps, &segment, index).await
    })
    .await;

    per_segment.into_iter().flatten().collect()
}

/// Detect behaviors in one segment. Never fails the job: policy skips and
/// unparseable responses degrade to an empty segment result.
async fn detect_segment(deps: &DetectionDeps<'_>, segment: &Segment, index: usize) -> Vec<Detection> {
    let label = format!("detect[{}]", index);
    let request = detection_request(deps, segment, deps.temperature, false);

    let text = match call_with_policy(&label, deps.limiter, deps.policy, || {
        deps.backend.generate(&request)
    })
    .await
    {
        Ok(text) => text,
        Err(skip) => {
            warn!(segment = index, reason = %skip.reason, "Detection unit skipped");
            metrics::counter!(names::UNITS_SKIPPED_TOTAL, "stage" => "detect").increment(1);
            return Vec::new();
        }
    };

    let raw = match parse_detection_array(&text) {
        Some(items) => items,
        None => {
            debug!(segment = index, "Response was not a JSON array, retrying strict");
            let strict = detection_request(deps, segment, STRICT_RETRY_TEMPERATURE, true);
            let retry_text = match call_with_policy(&label, deps.limiter, deps.policy, || {
                deps.backend.generate(&strict)
            })
            .await
            {
                Ok(text) => text,
                Err(skip) => {
                    warn!(segment = index, reason = %skip.reason, "Strict retry skipped");
                    metrics::counter!(names::UNITS_SKIPPED_TOTAL, "stage" => "detect").increment(1);
                    return Vec::new();
                }
            };
            match parse_detection_array(&retry_text) {
                Some(items) => items,
                None => {
                    warn!(segment = index, "Strict retry still unparseable, dropping segment");
                    return Vec::new();
                }
            }
        }
    };

    raw.into_iter()
        .filter_map(|item| normalize_detection(item, segment, deps.min_duration))
        .collect()
}

fn detection_request(
    deps: &DetectionDeps<'_>,
    segment: &Segment,
    temperature: f64,
    strict_reminder: bool,
) -> GenerateRequest {
    let mut prompt = detection_prompt(segment);
    if strict_reminder {
        prompt.push_str(STRICT_JSON_REMINDER);
    }
    GenerateRequest {
        model: deps.model.to_string(),
        media: MediaRef {
            uri: deps.media_uri.to_string(),
            mime_type: deps.media_mime.to_string(),
            start_offset_sec: Some(segment.start_sec),
            end_offset_sec: Some(segment.end_sec),
            fps: deps.fps,
        },
        prompt,
        config: GenerationConfig::json(temperature, detection_response_schema()),
    }
}

/// Strip leading/trailing markdown code fences from a response.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Parse the response as a detection array; strict first, then a lenient
/// extraction of the outermost `[...]` from surrounding prose.
pub fn parse_detection_array(text: &str) -> Option<Vec<RawDetection>> {
    let text = strip_code_fences(text);

    if let Ok(items) = serde_json::from_str::<Vec<RawDetection>>(text) {
        return Some(items);
    }

    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Normalize one raw item into an absolute-time detection.
///
/// Items outside the closed vocabulary, with an unknown modality, or with
/// non-finite or inverted bounds are dropped. Clip-relative times shift by
/// the segment start and clamp into the segment span, so a raw detection can
/// never escape the window it was observed in. Spans shorter than the
/// minimum duration are extended.
pub fn normalize_detection(
    raw: RawDetection,
    segment: &Segment,
    min_duration: f64,
) -> Option<Detection> {
    let behavior = Behavior::from_label(&raw.behavior)?;

    let modality = match raw.modality.as_deref() {
        None => behavior.modality(),
        Some(value) => match value.trim().to_lowercase().as_str() {
            "visual" => Modality::Visual,
            "audio" => Modality::Audio,
            _ => return None,
        },
    };

    let (start, end) = match (raw.start_sec, raw.end_sec) {
        (Some(start), Some(end)) if start.is_finite() && end.is_finite() && end >= start => {
            (start, end)
        }
        _ => return None,
    };

    let mut start = (segment.start_sec + start).clamp(segment.start_sec, segment.end_sec);
    let mut end = (segment.start_sec + end).clamp(segment.start_sec, segment.end_sec);

    if end - start < min_duration {
        end = (start + min_duration).min(segment.end_sec);
        if end - start < min_duration {
            start = (end - min_duration).max(segment.start_sec);
        }
    }

    Some(Detection {
        behavior,
        modality,
        start_sec: round3(start),
        end_sec: round3(end),
        notes: raw.notes.unwrap_or_default().trim().to_string(),
    })
}
