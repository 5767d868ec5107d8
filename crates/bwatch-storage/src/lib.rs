//! Object storage for the BehaviorWatch worker.
//!
//! This crate provides:
//! - The `BlobStore` capability set the worker is written against
//! - An S3-compatible client for production
//! - An in-memory store for tests
//! - The session record repository layered on top

pub mod client;
pub mod error;
pub mod memory;
pub mod sessions;

pub use client::{BlobStore, S3Client, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use sessions::SessionStore;
