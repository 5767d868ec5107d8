//! Validation stage: confirm or refine merged spans against margin-expanded
//! clips.

use serde::Deserialize;
use tracing::{debug, warn};

use bwatch_inference::{GenerateRequest, GenerationConfig, InferenceBackend, MediaRef};
use bwatch_models::{Detection, Segment, ValidatedBehavior};

use crate::detect::strip_code_fences;
use crate::merge::round3;
use crate::metrics::names;
use crate::policy::{call_with_policy, CallPolicy};
use crate::pool::run_bounded;
use crate::prompts::{validation_prompt, validation_response_schema, STRICT_JSON_REMINDER};
use crate::rate_limit::RateLimitController;

const STRICT_RETRY_TEMPERATURE: f64 = 0.0;

/// The model's verdict on one span, before mapping back to absolute time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawValidation {
    pub correct: bool,
    #[serde(default)]
    pub start_sec: Option<f64>,
    #[serde(default)]
    pub end_sec: Option<f64>,
}

/// Everything a validation worker needs, shared across the pool.
pub struct ValidationDeps<'a> {
    pub backend: &'a dyn InferenceBackend,
    pub limiter: &'a RateLimitController,
    pub policy: &'a CallPolicy,
    pub model: &'a str,
    pub media_uri: &'a str,
    pub media_mime: &'a str,
    pub fps: Option<f64>,
    pub temperature: f64,
    /// Full source video duration; validation clips never extend past it.
    pub duration: f64,
    pub margin: f64,
    pub min_duration: f64,
}

/// Run validation over the merged spans under the bounded pool. Order is
/// preserved; rejected spans are dropped, skipped spans survive with their
/// pre-validation bounds.
pub async fn run_validation_stage(
    deps: &ValidationDeps<'_>,
    merged: &[Detection],
    concurrency: usize,
) -> Vec<ValidatedBehavior> {
    let outcomes = run_bounded(concurrency, merged.to_vec(), |item, index| async move {
        validate_span(deps, &item, index).await
    })
    .await;

    outcomes.into_iter().flatten().collect()
}

/// Validate one merged span. `None` means the model rejected it; a policy
/// skip or unparseable verdict keeps the detector's span, marked skipped --
/// a throttled validator must not discard what the detector already found.
async fn validate_span(
    deps: &ValidationDeps<'_>,
    detection: &Detection,
    index: usize,
) -> Option<ValidatedBehavior> {
    let label = format!("validate[{}]", index);
    let clip = validation_clip(detection, deps.margin, deps.duration);
    let (clip_start, clip_end) = (clip.start_sec, clip.end_sec);

    let request = validation_request(deps, detection, clip_start, clip_end, deps.temperature, false);

    let skipped = |reason: &str| {
        warn!(span = index, reason, "Validation unit skipped, keeping detector bounds");
        metrics::counter!(names::UNITS_SKIPPED_TOTAL, "stage" => "validate").increment(1);
        Some(ValidatedBehavior::skipped(detection))
    };

    let text = match call_with_policy(&label, deps.limiter, deps.policy, || {
        deps.backend.generate(&request)
    })
    .await
    {
        Ok(text) => text,
        Err(skip) => return skipped(&skip.reason),
    };

    let raw = match parse_validation_object(&text) {
        Some(raw) => raw,
        None => {
            debug!(span = index, "Verdict was not a JSON object, retrying strict");
            let strict = validation_request(
                deps,
                detection,
                clip_start,
                clip_end,
                STRICT_RETRY_TEMPERATURE,
                true,
            );
            let retry_text = match call_with_policy(&label, deps.limiter, deps.policy, || {
                deps.backend.generate(&strict)
            })
            .await
            {
                Ok(text) => text,
                Err(skip) => return skipped(&skip.reason),
            };
            match parse_validation_object(&retry_text) {
                Some(raw) => raw,
                None => return skipped("verdict unparseable after strict retry"),
            }
        }
    };

    if !raw.correct {
        debug!(span = index, behavior = %detection.behavior, "Span rejected by validation");
        return None;
    }

    Some(refine_bounds(
        detection,
        &raw,
        clip_start,
        clip_end,
        deps.min_duration,
    ))
}

fn validation_request(
    deps: &ValidationDeps<'_>,
    detection: &Detection,
    clip_start: f64,
    clip_end: f64,
    temperature: f64,
    strict_reminder: bool,
) -> GenerateRequest {
    let mut prompt = validation_prompt(detection.behavior, detection.modality, clip_start, clip_end);
    if strict_reminder {
        prompt.push_str(STRICT_JSON_REMINDER);
    }
    GenerateRequest {
        model: deps.model.to_string(),
        media: MediaRef {
            uri: deps.media_uri.to_string(),
            mime_type: deps.media_mime.to_string(),
            start_offset_sec: Some(clip_start),
            end_offset_sec: Some(clip_end),
            fps: deps.fps,
        },
        prompt,
        config: GenerationConfig::json(temperature, validation_response_schema()),
    }
}

/// Parse the verdict; strict first, then a lenient extraction of the
/// outermost `{...}` from surrounding prose.
pub fn parse_validation_object(text: &str) -> Option<RawValidation> {
    let text = strip_code_fences(text);

    if let Ok(raw) = serde_json::from_str::<RawValidation>(text) {
        return Some(raw);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Map refined clip-relative bounds back to absolute time.
///
/// Refined values are offsets into the validation clip; absent or non-finite
/// values fall back to the detector's bounds. Results clamp into the clip,
/// keep `end >= start + 0.01`, and honor the minimum span duration.
pub fn refine_bounds(
    detection: &Detection,
    raw: &RawValidation,
    clip_start: f64,
    clip_end: f64,
    min_duration: f64,
) -> ValidatedBehavior {
    let (mut start, mut end) = match (raw.start_sec, raw.end_sec) {
        (Some(start), Some(end)) if start.is_finite() && end.is_finite() => {
            (clip_start + start, clip_start + end)
        }
        _ => (detection.start_sec, detection.end_sec),
    };

    start = start.clamp(clip_start, clip_end);
    end = end.clamp(clip_start, clip_end);

    if end < start + 0.01 {
        end = (start + 0.01).min(clip_end);
        if end < start + 0.01 {
            start = (end - 0.01).max(clip_start);
        }
    }

    if end - start < min_duration {
        end = (start + min_duration).min(clip_end);
        if end - start < min_duration {
            start = (end - min_duration).max(clip_start);
        }
    }

    ValidatedBehavior::confirmed(detection, round3(start), round3(end))
}

/// Margin-expanded clip window for one span, clamped to the video.
pub fn validation_clip(detection: &Detection, margin: f64, duration: f64) -> Segment {
    Segment {
        start_sec: (detection.start_sec - margin).max(0.0),
        end_sec: (detection.end_sec + margin).min(duration),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bwatch_models::Behavior;

    fn detection() -> Detection {
        Detection::new(Behavior::BodyRocking, 10.0, 15.0)
    }

    #[test]
    fn test_parse_verdict_variants() {
        assert!(parse_validation_object(r#"{"correct": true}"#).unwrap().correct);
        assert!(!parse_validation_object("```json\n{\"correct\": false}\n```")
            .unwrap()
            .correct);
        let embedded = parse_validation_object(
            "The verdict is: {\"correct\": true, \"startSec\": 2.5, \"endSec\": 6.0} as requested",
        )
        .unwrap();
        assert_eq!(embedded.start_sec, Some(2.5));
        assert!(parse_validation_object("yes it is correct").is_none());
    }

    #[test]
    fn test_refine_maps_clip_relative_to_absolute() {
        let raw = RawValidation {
            correct: true,
            start_sec: Some(3.5),
            end_sec: Some(7.0),
        };
        // clip is [7, 18]
        let refined = refine_bounds(&detection(), &raw, 7.0, 18.0, 0.8);
        assert_eq!(refined.start_sec, 10.5);
        assert_eq!(refined.end_sec, 14.0);
        assert!(!refined.skipped);
    }

    #[test]
    fn test_refine_without_bounds_keeps_detector_times() {
        let raw = RawValidation {
            correct: true,
            start_sec: None,
            end_sec: None,
        };
        let refined = refine_bounds(&detection(), &raw, 7.0, 18.0, 0.8);
        assert_eq!(refined.start_sec, 10.0);
        assert_eq!(refined.end_sec, 15.0);
    }

    #[test]
    fn test_refine_clamps_into_clip() {
        let raw = RawValidation {
            correct: true,
            start_sec: Some(-5.0),
            end_sec: Some(50.0),
        };
        let refined = refine_bounds(&detection(), &raw, 7.0, 18.0, 0.8);
        assert_eq!(refined.start_sec, 7.0);
        assert_eq!(refined.end_sec, 18.0);
    }

    #[test]
    fn test_refine_enforces_epsilon_and_minimum() {
        let raw = RawValidation {
            correct: true,
            start_sec: Some(4.0),
            end_sec: Some(4.0),
        };
        let refined = refine_bounds(&detection(), &raw, 7.0, 18.0, 0.8);
        assert!(refined.end_sec - refined.start_sec >= 0.8 - 1e-9);
        assert_eq!(refined.start_sec, 11.0);
        assert_eq!(refined.end_sec, 11.8);
    }

    #[test]
    fn test_validation_clip_respects_video_bounds() {
        let near_start = Detection::new(Behavior::Crying, 1.0, 2.0);
        let clip = validation_clip(&near_start, 3.0, 45.0);
        assert_eq!(clip.start_sec, 0.0);
        assert_eq!(clip.end_sec, 5.0);

        let near_end = Detection::new(Behavior::Crying, 43.0, 44.5);
        let clip = validation_clip(&near_end, 3.0, 45.0);
        assert_eq!(clip.end_sec, 45.0);
    }
}
