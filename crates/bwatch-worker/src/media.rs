//! Media tooling seam.
//!
//! The analyzer talks to ffmpeg/ffprobe through this trait so the end-to-end
//! scenario tests can script media behavior without external tools. The
//! production implementation delegates to the media crate.

use std::path::Path;

use async_trait::async_trait;

use bwatch_media::MediaResult;
use bwatch_models::Detection;

/// External media tool invocations the analyzer depends on.
#[async_trait]
pub trait MediaPipeline: Send + Sync {
    /// Frame-accurate container duration, in seconds.
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64>;

    /// Stream frame rate, if reported.
    async fn probe_fps(&self, path: &Path) -> MediaResult<Option<f64>>;

    /// Re-encode with the wall-clock overlay; callers degrade on failure.
    async fn burn_timestamp_overlay(&self, input: &Path, output: &Path) -> MediaResult<()>;

    /// Write the SRT for the final behavior set.
    async fn write_srt(&self, behaviors: &[Detection], path: &Path) -> MediaResult<()>;

    /// Re-encode with subtitles burned in; failure is job-fatal.
    async fn burn_subtitles(&self, input: &Path, output: &Path, srt: &Path) -> MediaResult<()>;
}

/// Production pipeline over the ffmpeg/ffprobe wrappers.
#[derive(Debug, Clone, Default)]
pub struct FfmpegPipeline;

#[async_trait]
impl MediaPipeline for FfmpegPipeline {
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        bwatch_media::probe_duration(path).await
    }

    async fn probe_fps(&self, path: &Path) -> MediaResult<Option<f64>> {
        bwatch_media::probe_fps(path).await
    }

    async fn burn_timestamp_overlay(&self, input: &Path, output: &Path) -> MediaResult<()> {
        bwatch_media::burn_timestamp_overlay(input, output).await
    }

    async fn write_srt(&self, behaviors: &[Detection], path: &Path) -> MediaResult<()> {
        bwatch_media::write_srt(behaviors, path).await
    }

    async fn burn_subtitles(&self, input: &Path, output: &Path, srt: &Path) -> MediaResult<()> {
        bwatch_media::burn_subtitles(input, output, srt).await
    }
}
