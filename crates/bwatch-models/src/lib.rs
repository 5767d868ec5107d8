//! Shared data models for the BehaviorWatch worker.
//!
//! This crate provides Serde-serializable types for:
//! - The closed behavior vocabulary and its visual/audio partition
//! - Detections, validated spans, and the final analysis report
//! - Analysis segments (overlapping windows over the source video)
//! - Session records and their status lifecycle
//! - Storage events and object path conventions

pub mod behavior;
pub mod detection;
pub mod event;
pub mod paths;
pub mod segment;
pub mod session;

pub use behavior::{Behavior, Modality};
pub use detection::{Detection, FinalReport, ValidatedBehavior, MIN_ACTION_DURATION_SECONDS};
pub use event::{StorageEvent, VideoObjectRef, OBJECT_FINALIZE};
pub use paths::{analysis_object_key, analysis_prefix, session_object_key, ArtifactKind};
pub use segment::{plan_segments, Segment};
pub use session::{SessionRecord, SessionStatus, WorkerInfo};
