//! Analysis window planning.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One fixed-length analysis window over the source video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_sec: f64,
    pub end_sec: f64,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end_sec - self.start_sec
    }
}

/// Split `[0, duration)` into windows of `chunk_seconds`, each overlapping
/// the previous one by `overlap_seconds`, truncated at the duration.
///
/// The overlap exists so an action straddling a window boundary appears in at
/// least one window intact. The final window always ends at the duration.
pub fn plan_segments(duration: f64, chunk_seconds: f64, overlap_seconds: f64) -> Vec<Segment> {
    if duration <= 0.0 {
        return Vec::new();
    }

    let step = (chunk_seconds - overlap_seconds).max(1.0);
    let mut segments = Vec::new();
    let mut start = 0.0;

    loop {
        let end = (start + chunk_seconds).min(duration);
        segments.push(Segment {
            start_sec: start,
            end_sec: end,
        });
        if end >= duration {
            break;
        }
        start += step;
    }

    segments
}
