//! Generative-model backend for the BehaviorWatch worker.
//!
//! This crate provides:
//! - The `InferenceBackend` capability set (media upload, readiness polling,
//!   multimodal generation)
//! - A Gemini REST client implementation
//! - Error classification the retry policy relies on

pub mod client;
pub mod error;
pub mod types;

pub use client::GeminiClient;
pub use error::{InferenceError, InferenceResult};
pub use types::{
    FileState, GenerateRequest, GenerationConfig, InferenceBackend, MediaHandle, MediaRef,
};
