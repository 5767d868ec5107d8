//! SRT generation and subtitle burn-in.

use std::path::Path;
use tracing::info;

use bwatch_models::Detection;

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// Format seconds as an SRT timestamp, `HH:MM:SS,mmm`.
pub fn format_srt_timestamp(seconds: f64) -> String {
    let clamped = seconds.max(0.0);
    let total_ms = (clamped * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let mins = (total_secs / 60) % 60;
    let hours = total_secs / 3600;
    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, ms)
}

/// Render behavior spans as a sequence-numbered SRT document.
///
/// Each cue is labeled `[visual|audio] <behavior>`. Spans are emitted in the
/// order given; callers pass the merged, start-sorted final set.
pub fn render_srt(behaviors: &[Detection]) -> String {
    let mut srt = String::new();
    for (index, item) in behaviors.iter().enumerate() {
        srt.push_str(&format!(
            "{}\n{} --> {}\n[{}] {}\n\n",
            index + 1,
            format_srt_timestamp(item.start_sec),
            format_srt_timestamp(item.end_sec),
            item.modality,
            item.behavior
        ));
    }
    srt
}

/// Write the SRT document for a behavior set to disk.
pub async fn write_srt(behaviors: &[Detection], path: impl AsRef<Path>) -> MediaResult<()> {
    tokio::fs::write(path.as_ref(), render_srt(behaviors)).await?;
    Ok(())
}

/// Escape a path for use inside an ffmpeg filter argument. The filter parser
/// treats `:` as an option separator and `'` as a quote, so both must be
/// escaped along with backslashes.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Re-encode `input` into `output` with `srt` burned in as open subtitles.
///
/// Unlike the timestamp overlay this step is fatal on failure; without it
/// there is no output video to publish.
pub async fn burn_subtitles(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    srt: impl AsRef<Path>,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();
    let srt = srt.as_ref();

    info!(
        "Burning subtitles: {} + {} -> {}",
        input.display(),
        srt.display(),
        output.display()
    );

    let filter = format!("subtitles='{}'", escape_filter_path(srt));

    FfmpegCommand::new(input, output)
        .video_filter(filter)
        .standard_encode()
        .run()
        .await
}
