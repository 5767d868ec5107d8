//! Session records and their status lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a session record.
///
/// The worker owns the `Awaiting|Processing -> Processing -> {Pending review,
/// Failed}` transitions; `Reviewed` is set by downstream review actions and is
/// terminal as far as re-processing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SessionStatus {
    #[default]
    Awaiting,
    Processing,
    #[serde(rename = "Pending review")]
    PendingReview,
    Reviewed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Awaiting => "Awaiting",
            Self::Processing => "Processing",
            Self::PendingReview => "Pending review",
            Self::Reviewed => "Reviewed",
            Self::Failed => "Failed",
        }
    }

    /// True for states a finalize re-delivery must not reprocess.
    pub fn is_processed(&self) -> bool {
        matches!(self, Self::PendingReview | Self::Reviewed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Worker-stamped analysis metadata on a completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInfo {
    pub model: String,
    pub duration_sec: f64,
    pub merged_behavior_count: usize,
}

/// The persisted session record, one JSON object per `(icdKey, uploadEpoch)`.
///
/// Fields the worker does not own (manual annotations, review notes) are
/// preserved across read-modify-write through the flattened `extra` map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_review_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_json_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_video_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_source_video_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerInfo>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionRecord {
    /// True when this record already carries a complete artifact set; used by
    /// the idempotency gate for re-delivered finalize events.
    pub fn is_already_processed(&self) -> bool {
        self.status.is_processed()
            && self.analysis_json_path.is_some()
            && self.processed_video_path.is_some()
    }

    /// Stamp the `Processing` transition.
    pub fn mark_processing(&mut self) {
        self.status = SessionStatus::Processing;
        self.processing_started_at = Some(Utc::now());
        self.processing_error = None;
    }

    /// Stamp the `Failed` transition with the job error.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = SessionStatus::Failed;
        self.failed_at = Some(Utc::now());
        self.processing_error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_strings() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::PendingReview).unwrap(),
            "\"Pending review\""
        );
        let status: SessionStatus = serde_json::from_str("\"Awaiting\"").unwrap();
        assert_eq!(status, SessionStatus::Awaiting);
    }

    #[test]
    fn test_already_processed_requires_artifacts() {
        let mut record = SessionRecord {
            status: SessionStatus::PendingReview,
            ..Default::default()
        };
        assert!(!record.is_already_processed());

        record.analysis_json_path = Some("analysis/icd/1/behaviors_final.json".into());
        record.processed_video_path = Some("analysis/icd/1/video_with_behaviors.mp4".into());
        assert!(record.is_already_processed());

        record.status = SessionStatus::Reviewed;
        assert!(record.is_already_processed());

        record.status = SessionStatus::Failed;
        assert!(!record.is_already_processed());
    }

    #[test]
    fn test_unknown_fields_survive_roundtrip() {
        let json = serde_json::json!({
            "storagePath": "child-videos/icd-abc/1234-session.mp4",
            "status": "Awaiting",
            "processingError": null,
            "reviewNotes": "therapist comment",
            "manualAnnotations": [{"label": "other"}]
        });
        let record: SessionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.status, SessionStatus::Awaiting);
        assert!(record.extra.contains_key("reviewNotes"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["reviewNotes"], "therapist comment");
        assert_eq!(back["manualAnnotations"][0]["label"], "other");
    }

    #[test]
    fn test_mark_processing_clears_error() {
        let mut record = SessionRecord {
            processing_error: Some("old failure".into()),
            ..Default::default()
        };
        record.mark_processing();
        assert_eq!(record.status, SessionStatus::Processing);
        assert!(record.processing_error.is_none());
        assert!(record.processing_started_at.is_some());
    }
}
