//! Analyzer orchestrator: upload, probe, detect, merge, validate, merge,
//! encode, emit artifacts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use bwatch_inference::{FileState, InferenceBackend, MediaHandle};
use bwatch_models::{plan_segments, ArtifactKind, Behavior, Detection, FinalReport};

use crate::config::WorkerConfig;
use crate::detect::{run_detection_stage, DetectionDeps};
use crate::error::{WorkerError, WorkerResult};
use crate::media::MediaPipeline;
use crate::merge::merge_detections;
use crate::policy::CallPolicy;
use crate::rate_limit::RateLimitController;
use crate::validate::{run_validation_stage, ValidationDeps};

const ANALYSIS_MIME: &str = "video/mp4";

/// Everything the analyzer produced for one session, on local disk.
#[derive(Debug)]
pub struct AnalysisArtifacts {
    pub raw_path: PathBuf,
    pub validated_path: PathBuf,
    pub final_path: PathBuf,
    pub video_path: PathBuf,
    pub duration_sec: f64,
    pub model: String,
    pub dominant_category: Option<Behavior>,
    pub behavior_summary: Option<String>,
    pub merged_behavior_count: usize,
}

/// Drives the full analysis pipeline for one video.
pub struct Analyzer {
    backend: Arc<dyn InferenceBackend>,
    media: Arc<dyn MediaPipeline>,
    limiter: Arc<RateLimitController>,
    config: WorkerConfig,
}

impl Analyzer {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        media: Arc<dyn MediaPipeline>,
        config: WorkerConfig,
    ) -> Self {
        let limiter = Arc::new(RateLimitController::new(config.global_rate_limit_pause));
        Self {
            backend,
            media,
            limiter,
            config,
        }
    }

    fn policy(&self) -> CallPolicy {
        CallPolicy {
            call_timeout: self.config.call_timeout,
            retry_interval: self.config.transient_retry_interval,
            max_transient_retries: self.config.max_transient_retries,
        }
    }

    /// Run the pipeline over `source`, leaving the four artifacts in
    /// `work_dir`. Unit-level skips never fail the job; a dead upload or a
    /// failed subtitle burn does.
    pub async fn analyze(&self, source: &Path, work_dir: &Path) -> WorkerResult<AnalysisArtifacts> {
        let config = &self.config;
        let policy = self.policy();

        // 1. Timestamp overlay; fall back to the original on failure.
        let overlaid = work_dir.join("analysis_input.mp4");
        let analysis_input = match self.media.burn_timestamp_overlay(source, &overlaid).await {
            Ok(()) => overlaid,
            Err(e) => {
                warn!(error = %e, "Timestamp overlay failed, analyzing original video");
                source.to_path_buf()
            }
        };

        // 2. Upload to the model service and wait for it to become ACTIVE.
        let handle = self
            .backend
            .upload_media(&analysis_input, ANALYSIS_MIME)
            .await?;
        let handle = self.wait_until_active(handle).await?;
        let media_uri = handle.uri.clone().ok_or_else(|| {
            WorkerError::MediaNotReady(format!("{} became ACTIVE without a uri", handle.name))
        })?;

        // 3. Probe and plan segments.
        let duration = self.media.probe_duration(&analysis_input).await?;
        let source_fps = self.media.probe_fps(&analysis_input).await.ok().flatten();
        // cap the effective fps; an unreported rate uses the cap itself
        let fps = Some(source_fps.map_or(config.max_clip_fps, |f| f.min(config.max_clip_fps)));
        let segments = plan_segments(duration, config.chunk_seconds, config.chunk_overlap_seconds);

        info!(
            duration_sec = duration,
            segments = segments.len(),
            model = %config.model,
            "Starting detection stage"
        );

        // 4. Detection over the pool.
        let detection_deps = DetectionDeps {
            backend: self.backend.as_ref(),
            limiter: self.limiter.as_ref(),
            policy: &policy,
            model: &config.model,
            media_uri: &media_uri,
            media_mime: ANALYSIS_MIME,
            fps,
            temperature: config.temperature,
            min_duration: config.min_action_duration_seconds,
        };
        let raw = run_detection_stage(&detection_deps, &segments, config.concurrency).await;

        let raw_path = work_dir.join(ArtifactKind::RawBehaviors.file_name());
        write_json_artifact(&raw_path, &raw).await?;

        // 5. First merge, input to validation.
        let merged = merge_detections(raw, config.merge_gap_seconds);
        info!(spans = merged.len(), "Starting validation stage");

        // 6-7. Validation over the pool; rejected spans drop, skipped spans
        // keep their detector bounds.
        let validation_deps = ValidationDeps {
            backend: self.backend.as_ref(),
            limiter: self.limiter.as_ref(),
            policy: &policy,
            model: &config.model,
            media_uri: &media_uri,
            media_mime: ANALYSIS_MIME,
            fps,
            temperature: config.temperature,
            duration,
            margin: config.validation_margin_seconds,
            min_duration: config.min_action_duration_seconds,
        };
        let validated = run_validation_stage(&validation_deps, &merged, config.concurrency).await;

        let validated_path = work_dir.join(ArtifactKind::ValidatedBehaviors.file_name());
        write_json_artifact(&validated_path, &validated).await?;

        // 8-10. Second merge and final report. An empty set is a valid result.
        let final_set: Vec<Detection> = validated
            .into_iter()
            .map(|item| item.into_detection())
            .collect();
        let report = FinalReport::new(merge_detections(final_set, config.merge_gap_seconds));

        let final_path = work_dir.join(ArtifactKind::FinalBehaviors.file_name());
        write_json_artifact(&final_path, &report).await?;

        // 11-12. Subtitles onto the analysis input. This burn is fatal: no
        // output video means no artifact set.
        let srt_path = work_dir.join("behaviors.srt");
        self.media.write_srt(&report.behaviors, &srt_path).await?;

        let video_path = work_dir.join(ArtifactKind::ProcessedVideo.file_name());
        self.media
            .burn_subtitles(&analysis_input, &video_path, &srt_path)
            .await?;

        info!(
            behaviors = report.total_behaviors,
            dominant = report.dominant_category.map(|b| b.as_str()).unwrap_or("none"),
            "Analysis complete"
        );

        Ok(AnalysisArtifacts {
            raw_path,
            validated_path,
            final_path,
            video_path,
            duration_sec: duration,
            model: config.model.clone(),
            dominant_category: report.dominant_category,
            behavior_summary: report.summary(),
            merged_behavior_count: report.total_behaviors,
        })
    }

    /// Poll `files.get` until the uploaded media reports ACTIVE, bounded by
    /// the readiness deadline. ERROR and a missed deadline are both fatal.
    async fn wait_until_active(&self, handle: MediaHandle) -> WorkerResult<MediaHandle> {
        let deadline = Instant::now() + self.config.file_ready_timeout;
        let mut current = handle;

        loop {
            match current.state {
                FileState::Active => return Ok(current),
                FileState::Error => {
                    return Err(WorkerError::MediaNotReady(format!(
                        "{} reported ERROR during processing",
                        current.name
                    )))
                }
                FileState::Processing => {
                    if Instant::now() >= deadline {
                        return Err(WorkerError::MediaNotReady(format!(
                            "{} still processing after {}s",
                            current.name,
                            self.config.file_ready_timeout.as_secs()
                        )));
                    }
                    tokio::time::sleep(self.config.file_poll_interval).await;
                    current = self.backend.get_media(&current.name).await?;
                }
            }
        }
    }
}

async fn write_json_artifact<T: serde::Serialize>(path: &Path, value: &T) -> WorkerResult<()> {
    let data = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, data).await?;
    Ok(())
}
