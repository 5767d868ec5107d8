//! Detections, validated spans, and the final analysis report.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::behavior::{Behavior, Modality};

/// Minimum length of an emitted behavior span, in seconds. Detections shorter
/// than this are extended to it rather than dropped.
pub const MIN_ACTION_DURATION_SECONDS: f64 = 0.8;

/// A single behavior span on the source video.
///
/// Times are seconds relative to the full source video once the detection
/// stage has shifted segment-relative timestamps to absolute time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub behavior: Behavior,
    pub modality: Modality,
    pub start_sec: f64,
    pub end_sec: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

impl Detection {
    pub fn new(behavior: Behavior, start_sec: f64, end_sec: f64) -> Self {
        Self {
            behavior,
            modality: behavior.modality(),
            start_sec,
            end_sec,
            notes: String::new(),
        }
    }

    /// The merge key: spans only ever coalesce within the same key.
    pub fn key(&self) -> (Behavior, Modality) {
        (self.behavior, self.modality)
    }

    pub fn duration(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

/// A merged span after the validation stage has confirmed or refined it.
///
/// `skipped` marks spans whose validation call exhausted its policy budget;
/// those keep their pre-validation bounds and are treated as confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedBehavior {
    pub behavior: Behavior,
    pub modality: Modality,
    pub start_sec: f64,
    pub end_sec: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

impl ValidatedBehavior {
    pub fn confirmed(detection: &Detection, start_sec: f64, end_sec: f64) -> Self {
        Self {
            behavior: detection.behavior,
            modality: detection.modality,
            start_sec,
            end_sec,
            notes: detection.notes.clone(),
            skipped: false,
        }
    }

    pub fn skipped(detection: &Detection) -> Self {
        Self {
            behavior: detection.behavior,
            modality: detection.modality,
            start_sec: detection.start_sec,
            end_sec: detection.end_sec,
            notes: detection.notes.clone(),
            skipped: true,
        }
    }

    pub fn into_detection(self) -> Detection {
        Detection {
            behavior: self.behavior,
            modality: self.modality,
            start_sec: self.start_sec,
            end_sec: self.end_sec,
            notes: self.notes,
        }
    }
}

/// Contents of `behaviors_final.json`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalReport {
    pub generated_at: DateTime<Utc>,
    pub dominant_category: Option<Behavior>,
    pub total_behaviors: usize,
    pub behaviors: Vec<Detection>,
}

impl FinalReport {
    pub fn new(behaviors: Vec<Detection>) -> Self {
        Self {
            generated_at: Utc::now(),
            dominant_category: dominant_category(&behaviors),
            total_behaviors: behaviors.len(),
            behaviors,
        }
    }

    /// Human-readable per-behavior counts, e.g.
    /// `"body-rocking x3, humming x1"`. Empty sets yield `None`.
    pub fn summary(&self) -> Option<String> {
        if self.behaviors.is_empty() {
            return None;
        }
        let mut counts: Vec<(Behavior, usize)> = Vec::new();
        for item in &self.behaviors {
            match counts.iter_mut().find(|(b, _)| *b == item.behavior) {
                Some((_, n)) => *n += 1,
                None => counts.push((item.behavior, 1)),
            }
        }
        Some(
            counts
                .iter()
                .map(|(b, n)| format!("{} x{}", b, n))
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

/// The behavior with the highest span count, first-wins on ties.
pub fn dominant_category(behaviors: &[Detection]) -> Option<Behavior> {
    let mut counts: Vec<(Behavior, usize)> = Vec::new();
    for item in behaviors {
        match counts.iter_mut().find(|(b, _)| *b == item.behavior) {
            Some((_, n)) => *n += 1,
            None => counts.push((item.behavior, 1)),
        }
    }
    // counts is in first-appearance order, so strict greater-than keeps the
    // earliest behavior on ties
    let mut best: Option<(Behavior, usize)> = None;
    for (behavior, count) in counts {
        if best.map_or(true, |(_, n)| count > n) {
            best = Some((behavior, count));
        }
    }
    best.map(|(behavior, _)| behavior)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_serde_camel_case() {
        let detection = Detection::new(Behavior::BodyRocking, 1.0, 2.5);
        let json = serde_json::to_value(&detection).unwrap();
        assert_eq!(json["behavior"], "body-rocking");
        assert_eq!(json["modality"], "visual");
        assert_eq!(json["startSec"], 1.0);
        assert!(json.get("notes").is_none());
    }

    #[test]
    fn test_dominant_category_first_wins_on_tie() {
        let behaviors = vec![
            Detection::new(Behavior::Humming, 0.0, 1.0),
            Detection::new(Behavior::BodyRocking, 2.0, 3.0),
        ];
        assert_eq!(dominant_category(&behaviors), Some(Behavior::Humming));
    }

    #[test]
    fn test_dominant_category_counts() {
        let behaviors = vec![
            Detection::new(Behavior::Humming, 0.0, 1.0),
            Detection::new(Behavior::BodyRocking, 2.0, 3.0),
            Detection::new(Behavior::BodyRocking, 5.0, 6.0),
        ];
        assert_eq!(dominant_category(&behaviors), Some(Behavior::BodyRocking));
        assert_eq!(dominant_category(&[]), None);
    }

    #[test]
    fn test_final_report_summary() {
        let report = FinalReport::new(vec![
            Detection::new(Behavior::BodyRocking, 0.0, 1.0),
            Detection::new(Behavior::BodyRocking, 3.0, 4.0),
            Detection::new(Behavior::Crying, 6.0, 8.0),
        ]);
        assert_eq!(report.total_behaviors, 3);
        assert_eq!(report.dominant_category, Some(Behavior::BodyRocking));
        assert_eq!(
            report.summary().unwrap(),
            "body-rocking x2, crying x1"
        );
        assert!(FinalReport::new(vec![]).summary().is_none());
    }

    #[test]
    fn test_skipped_flag_only_serialized_when_set() {
        let detection = Detection::new(Behavior::Echolalia, 1.0, 2.0);
        let confirmed = ValidatedBehavior::confirmed(&detection, 1.0, 2.0);
        let json = serde_json::to_value(&confirmed).unwrap();
        assert!(json.get("skipped").is_none());

        let skipped = ValidatedBehavior::skipped(&detection);
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["skipped"], true);
    }
}
