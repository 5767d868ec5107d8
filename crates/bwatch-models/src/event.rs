//! Storage finalize events and video object path parsing.

use serde::{Deserialize, Serialize};

/// Event type emitted when an object upload completes.
pub const OBJECT_FINALIZE: &str = "OBJECT_FINALIZE";

/// A storage notification, already unwrapped from its push envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEvent {
    pub event_type: String,
    pub bucket_name: String,
    pub object_name: String,
}

impl StorageEvent {
    pub fn is_finalize(&self) -> bool {
        self.event_type == OBJECT_FINALIZE
    }
}

/// A parsed reference to an uploaded session video.
///
/// Source videos live at `<videos-prefix>/<icdKey>/<epoch>-<safeName>`; the
/// epoch is the leading numeric run of the filename and may be absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoObjectRef {
    pub icd_key: String,
    pub upload_epoch: Option<i64>,
    pub file_name: String,
}

impl VideoObjectRef {
    /// Parse an object name under the child-videos prefix. Returns `None` for
    /// objects outside the prefix or without the `<icdKey>/<file>` shape.
    pub fn parse(videos_prefix: &str, object_name: &str) -> Option<Self> {
        let prefix = videos_prefix.trim_matches('/');
        let rest = object_name
            .trim_start_matches('/')
            .strip_prefix(prefix)?
            .strip_prefix('/')?;

        let mut parts = rest.splitn(2, '/');
        let icd_key = parts.next().filter(|s| !s.is_empty())?;
        let file_name = parts.next().filter(|s| !s.is_empty() && !s.contains('/'))?;

        Some(Self {
            icd_key: icd_key.to_string(),
            upload_epoch: leading_epoch(file_name),
            file_name: file_name.to_string(),
        })
    }
}

/// Leading numeric run of a filename, e.g. `1234-clip.mp4` -> `1234`.
fn leading_epoch(file_name: &str) -> Option<i64> {
    let digits: String = file_name.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_path() {
        let parsed =
            VideoObjectRef::parse("child-videos", "child-videos/icd-abc/1234-session one.mp4")
                .unwrap();
        assert_eq!(parsed.icd_key, "icd-abc");
        assert_eq!(parsed.upload_epoch, Some(1234));
        assert_eq!(parsed.file_name, "1234-session one.mp4");
    }

    #[test]
    fn test_parse_rejects_out_of_scope_paths() {
        assert!(VideoObjectRef::parse("child-videos", "uploads/icd-abc/1.mp4").is_none());
        assert!(VideoObjectRef::parse("child-videos", "child-videos/icd-abc").is_none());
        assert!(VideoObjectRef::parse("child-videos", "child-videos//1.mp4").is_none());
        // nested directories under the icd key are not session videos
        assert!(
            VideoObjectRef::parse("child-videos", "child-videos/icd-abc/extra/1.mp4").is_none()
        );
    }

    #[test]
    fn test_parse_without_epoch() {
        let parsed = VideoObjectRef::parse("child-videos", "child-videos/icd-abc/clip.mp4").unwrap();
        assert_eq!(parsed.upload_epoch, None);
    }

    #[test]
    fn test_finalize_check() {
        let event = StorageEvent {
            event_type: OBJECT_FINALIZE.to_string(),
            bucket_name: "media".to_string(),
            object_name: "child-videos/icd-abc/1.mp4".to_string(),
        };
        assert!(event.is_finalize());

        let delete = StorageEvent {
            event_type: "OBJECT_DELETE".to_string(),
            ..event
        };
        assert!(!delete.is_finalize());
    }
}
