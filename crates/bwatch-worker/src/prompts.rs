//! Prompt templates and response schemas for the analysis stages.
//!
//! Prompts are data-driven: the behavior vocabulary and its clinical
//! definitions come from the models crate, so the closed set the parser
//! enforces is exactly the set the model is shown.

use bwatch_models::{Behavior, Modality, Segment};

/// Appended verbatim when the first response was not parseable JSON.
pub const STRICT_JSON_REMINDER: &str =
    "\n\nIMPORTANT: Respond with strict JSON only. No markdown, no code fences, no commentary.";

fn vocabulary_block(modality: Modality) -> String {
    Behavior::with_modality(modality)
        .map(|b| format!("- {}: {}", b, b.definition()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Detection prompt for one analysis window.
pub fn detection_prompt(segment: &Segment) -> String {
    format!(
        r#"You are analyzing a video clip of a child's therapy session for repetitive behaviors.

The clip you are given covers {start:.1}s to {end:.1}s of the full session video; a wall-clock timestamp is burned into the top-left corner of each frame.

Identify every occurrence of the behaviors below. Use ONLY these labels.

VISUAL behaviors (seen in the frames):
{visual}

AUDIO behaviors (heard on the soundtrack):
{audio}

Rules:
- Timestamps must be relative to the CLIP you are given (its first frame is 0).
- Report each continuous episode as ONE span from its start to its end. Do not split an ongoing behavior into per-second fragments.
- Only report behaviors of the child, not of adults in the room.
- If nothing occurs, return an empty array.

Return a JSON array of objects with fields: behavior, modality ("visual" or "audio"), startSec, endSec, notes."#,
        start = segment.start_sec,
        end = segment.end_sec,
        visual = vocabulary_block(Modality::Visual),
        audio = vocabulary_block(Modality::Audio),
    )
}

/// Validation prompt for one merged span, against its margin-expanded clip.
pub fn validation_prompt(
    behavior: Behavior,
    modality: Modality,
    clip_start: f64,
    clip_end: f64,
) -> String {
    format!(
        r#"You are verifying a single detection in a video clip of a child's therapy session.

The clip covers {start:.1}s to {end:.1}s of the full session video. A previous pass reported that the child shows this behavior somewhere inside the clip:

- {behavior} ({modality}): {definition}

Decide whether the behavior is actually present for the CHILD in this clip. If it is, refine the boundaries: startSec and endSec relative to the clip (its first frame is 0), tight around the behavior itself.

Return a JSON object: {{"correct": true/false, "startSec": number, "endSec": number}}. Omit the timestamps when correct is false."#,
        start = clip_start,
        end = clip_end,
        behavior = behavior,
        modality = modality,
        definition = behavior.definition(),
    )
}

/// Response schema for the detection stage: an array of detection objects.
pub fn detection_response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "behavior": { "type": "STRING" },
                "modality": { "type": "STRING", "enum": ["visual", "audio"] },
                "startSec": { "type": "NUMBER" },
                "endSec": { "type": "NUMBER" },
                "notes": { "type": "STRING" }
            },
            "required": ["behavior", "startSec", "endSec", "modality"]
        }
    })
}

/// Response schema for the validation stage.
pub fn validation_response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "correct": { "type": "BOOLEAN" },
            "startSec": { "type": "NUMBER" },
            "endSec": { "type": "NUMBER" }
        },
        "required": ["correct"]
    })
}
