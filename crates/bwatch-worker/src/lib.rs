#![deny(unreachable_patterns)]
//! Storage-event-driven video analysis worker.
//!
//! This crate provides:
//! - The rate-limit barrier and policy-wrapped inference call
//! - The bounded per-job worker pool
//! - Detection, merge, and validation stages over a session video
//! - The analyzer orchestrator and job processor
//! - The push-subscription HTTP intake

pub mod analyzer;
pub mod config;
pub mod detect;
pub mod error;
pub mod logging;
pub mod media;
pub mod merge;
pub mod metrics;
pub mod policy;
pub mod pool;
pub mod processor;
pub mod prompts;
pub mod rate_limit;
pub mod server;
pub mod validate;

pub use analyzer::{Analyzer, AnalysisArtifacts};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use media::{FfmpegPipeline, MediaPipeline};
pub use policy::{call_with_policy, CallPolicy, SkipUnit};
pub use pool::run_bounded;
pub use processor::{JobProcessor, ProcessOutcome};
pub use rate_limit::RateLimitController;
pub use server::{create_router, AppState};
