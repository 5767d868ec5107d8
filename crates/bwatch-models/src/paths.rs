//! Object key conventions shared by the worker and the web surface.

/// The four artifacts emitted per analyzed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    RawBehaviors,
    ValidatedBehaviors,
    FinalBehaviors,
    ProcessedVideo,
}

impl ArtifactKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::RawBehaviors => "behaviors_raw.json",
            Self::ValidatedBehaviors => "behaviors_validated.json",
            Self::FinalBehaviors => "behaviors_final.json",
            Self::ProcessedVideo => "video_with_behaviors.mp4",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::ProcessedVideo => "video/mp4",
            _ => "application/json",
        }
    }
}

/// `<sessions-prefix>/<icdKey>/<epoch>.json`
pub fn session_object_key(sessions_prefix: &str, icd_key: &str, upload_epoch: i64) -> String {
    format!(
        "{}/{}/{}.json",
        sessions_prefix.trim_matches('/'),
        icd_key,
        upload_epoch
    )
}

/// `<analysis-prefix>/<icdKey>/<epoch>/`
pub fn analysis_prefix(analysis_root: &str, icd_key: &str, upload_epoch: i64) -> String {
    format!(
        "{}/{}/{}",
        analysis_root.trim_matches('/'),
        icd_key,
        upload_epoch
    )
}

/// Full key of one artifact under the session's analysis prefix.
pub fn analysis_object_key(
    analysis_root: &str,
    icd_key: &str,
    upload_epoch: i64,
    kind: ArtifactKind,
) -> String {
    format!(
        "{}/{}",
        analysis_prefix(analysis_root, icd_key, upload_epoch),
        kind.file_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key() {
        assert_eq!(
            session_object_key("sessions", "icd-abc", 1234),
            "sessions/icd-abc/1234.json"
        );
        assert_eq!(
            session_object_key("/sessions/", "icd-abc", 1234),
            "sessions/icd-abc/1234.json"
        );
    }

    #[test]
    fn test_artifact_keys() {
        assert_eq!(
            analysis_object_key("analysis", "icd-abc", 99, ArtifactKind::FinalBehaviors),
            "analysis/icd-abc/99/behaviors_final.json"
        );
        assert_eq!(
            analysis_object_key("analysis", "icd-abc", 99, ArtifactKind::ProcessedVideo),
            "analysis/icd-abc/99/video_with_behaviors.mp4"
        );
        assert_eq!(ArtifactKind::ProcessedVideo.content_type(), "video/mp4");
    }
}
