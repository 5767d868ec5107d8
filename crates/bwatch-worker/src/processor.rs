//! Job processing: storage event in, artifacts and session transition out.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use bwatch_models::{
    analysis_object_key, ArtifactKind, SessionRecord, SessionStatus, StorageEvent, VideoObjectRef,
    WorkerInfo,
};
use bwatch_storage::{BlobStore, SessionStore};

use crate::analyzer::{AnalysisArtifacts, Analyzer};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics::names;

/// What a delivered event amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Processed {
        icd_key: String,
        upload_epoch: i64,
        behavior_count: usize,
    },
    Ignored {
        reason: &'static str,
    },
}

/// Resolves storage events to sessions, runs the analyzer, publishes
/// artifacts, and owns the session state machine while doing so.
pub struct JobProcessor {
    store: Arc<dyn BlobStore>,
    sessions: SessionStore,
    analyzer: Analyzer,
    config: WorkerConfig,
}

impl JobProcessor {
    pub fn new(store: Arc<dyn BlobStore>, analyzer: Analyzer, config: WorkerConfig) -> Self {
        let sessions = SessionStore::new(Arc::clone(&store), config.sessions_prefix.clone());
        Self {
            store,
            sessions,
            analyzer,
            config,
        }
    }

    /// Process one storage event end to end.
    ///
    /// Ignored outcomes are acknowledged without touching any session. A
    /// missing session is an error so the push subscription redelivers. Any
    /// failure after the `Processing` transition stamps `Failed` with the
    /// error message before propagating.
    pub async fn process_event(&self, event: &StorageEvent) -> WorkerResult<ProcessOutcome> {
        if !event.is_finalize() {
            metrics::counter!(names::JOBS_IGNORED_TOTAL, "reason" => "not_finalize").increment(1);
            return Ok(ProcessOutcome::Ignored {
                reason: "not_finalize",
            });
        }

        let Some(video) = VideoObjectRef::parse(&self.config.videos_prefix, &event.object_name)
        else {
            metrics::counter!(names::JOBS_IGNORED_TOTAL, "reason" => "out_of_scope").increment(1);
            return Ok(ProcessOutcome::Ignored {
                reason: "out_of_scope",
            });
        };

        let job_id = Uuid::new_v4();
        let span = info_span!(
            "job",
            %job_id,
            icd_key = %video.icd_key,
            object = %event.object_name
        );

        async {
            let started = Instant::now();

            let Some((epoch, mut record)) = self
                .sessions
                .resolve(&video.icd_key, video.upload_epoch, &event.object_name)
                .await?
            else {
                return Err(WorkerError::missing_session(event.object_name.clone()));
            };

            if record.is_already_processed() {
                info!(epoch, "Session already carries artifacts, ignoring redelivery");
                metrics::counter!(names::JOBS_IGNORED_TOTAL, "reason" => "already_processed")
                    .increment(1);
                return Ok(ProcessOutcome::Ignored {
                    reason: "already_processed",
                });
            }

            record.mark_processing();
            self.sessions.write(&video.icd_key, epoch, &record).await?;

            match self.run_job(&video, epoch, &event.object_name, &record).await {
                Ok(artifacts) => {
                    metrics::counter!(names::JOBS_PROCESSED_TOTAL).increment(1);
                    metrics::histogram!(names::JOB_DURATION_SECONDS)
                        .record(started.elapsed().as_secs_f64());
                    info!(
                        epoch,
                        behaviors = artifacts.merged_behavior_count,
                        "Session processed"
                    );
                    Ok(ProcessOutcome::Processed {
                        icd_key: video.icd_key.clone(),
                        upload_epoch: epoch,
                        behavior_count: artifacts.merged_behavior_count,
                    })
                }
                Err(e) => {
                    metrics::counter!(names::JOBS_FAILED_TOTAL).increment(1);
                    self.mark_failed(&video.icd_key, epoch, &record, &e).await;
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Steps 6-7: temp dir, download, analyze, publish artifacts, commit the
    /// session. The temp dir is removed on every exit path by its guard.
    async fn run_job(
        &self,
        video: &VideoObjectRef,
        epoch: i64,
        object_name: &str,
        pre_read: &SessionRecord,
    ) -> WorkerResult<AnalysisArtifacts> {
        let work_dir = tempfile::tempdir()?;

        let source = work_dir.path().join("source.mp4");
        self.store.download_to_file(object_name, &source).await?;

        let artifacts = self.analyzer.analyze(&source, work_dir.path()).await?;

        let uploads = [
            (ArtifactKind::RawBehaviors, &artifacts.raw_path),
            (ArtifactKind::ValidatedBehaviors, &artifacts.validated_path),
            (ArtifactKind::FinalBehaviors, &artifacts.final_path),
            (ArtifactKind::ProcessedVideo, &artifacts.video_path),
        ];
        for (kind, path) in uploads {
            let key = analysis_object_key(&self.config.analysis_prefix, &video.icd_key, epoch, kind);
            self.store
                .upload_from_file(path, &key, kind.content_type())
                .await?;
        }

        // Re-read immediately before the commit write so concurrent edits to
        // fields the worker does not own (review notes, annotations) survive.
        let mut latest = self
            .sessions
            .read(&video.icd_key, epoch)
            .await?
            .unwrap_or_else(|| pre_read.clone());

        latest.status = SessionStatus::PendingReview;
        latest.pending_review_at = Some(Utc::now());
        latest.processing_error = None;
        latest.dominant_category = artifacts.dominant_category.map(|b| b.as_str().to_string());
        latest.behavior_summary = artifacts.behavior_summary.clone();
        latest.analysis_json_path = Some(analysis_object_key(
            &self.config.analysis_prefix,
            &video.icd_key,
            epoch,
            ArtifactKind::FinalBehaviors,
        ));
        latest.processed_video_path = Some(analysis_object_key(
            &self.config.analysis_prefix,
            &video.icd_key,
            epoch,
            ArtifactKind::ProcessedVideo,
        ));
        latest.linked_source_video_path = Some(object_name.to_string());
        latest.worker = Some(WorkerInfo {
            model: artifacts.model.clone(),
            duration_sec: artifacts.duration_sec,
            merged_behavior_count: artifacts.merged_behavior_count,
        });

        self.sessions.write(&video.icd_key, epoch, &latest).await?;

        Ok(artifacts)
    }

    /// Stamp the `Failed` transition, preserving concurrent external edits
    /// through a fresh read. Best effort: the original error still propagates
    /// even when this write fails.
    async fn mark_failed(
        &self,
        icd_key: &str,
        epoch: i64,
        pre_read: &SessionRecord,
        job_error: &WorkerError,
    ) {
        let mut latest = match self.sessions.read(icd_key, epoch).await {
            Ok(Some(record)) => record,
            _ => pre_read.clone(),
        };
        latest.mark_failed(job_error.to_string());

        if let Err(write_error) = self.sessions.write(icd_key, epoch, &latest).await {
            error!(
                icd_key,
                epoch,
                error = %write_error,
                "Failed to record job failure on session"
            );
        }
    }
}
