//! Wall-clock timestamp overlay for analysis inputs.
//!
//! The analysis input carries a readable clock in the frame so the model can
//! anchor its timestamps to what it actually sees rather than estimating
//! frame offsets.

use std::path::Path;
use tracing::info;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// drawtext filter rendering the presentation timestamp as HH:MM:SS at (20,20).
const TIMESTAMP_FILTER: &str = "drawtext=text='%{pts\\:hms}':x=20:y=20:fontsize=36:fontcolor=white:box=1:boxcolor=black@0.5:boxborderw=8";

/// Re-encode `input` into `output` with the timestamp overlay burned in.
///
/// Callers treat failure as non-fatal and fall back to the original video.
pub async fn burn_timestamp_overlay(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    info!(
        "Burning timestamp overlay: {} -> {}",
        input.display(),
        output.display()
    );

    FfmpegCommand::new(input, output)
        .video_filter(TIMESTAMP_FILTER)
        .standard_encode()
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_places_clock_at_margin() {
        assert!(TIMESTAMP_FILTER.contains("x=20:y=20"));
        assert!(TIMESTAMP_FILTER.contains("pts\\:hms"));
    }
}
