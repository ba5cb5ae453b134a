//! # Beacon Infrastructure
//!
//! Infrastructure implementations of core delivery ports.
//!
//! This crate contains:
//! - The storage-backed record writer feeding the batch store
//! - An in-memory batch store with at-most-one-locked-reader semantics
//! - The per-category upload worker with adaptive backoff
//! - The best-effort shutdown flusher
//! - A reqwest-based upload client
//!
//! ## Architecture
//! - Implements traits defined in `beacon-core`
//! - Contains all "impure" code (I/O, HTTP)

pub mod errors;
pub mod net;
pub mod storage;
pub mod upload;

// Re-export commonly used items
pub use errors::UploadWorkerError;
pub use net::HttpUploadClient;
pub use storage::{InMemoryBatchStore, StorageRecordWriter};
pub use upload::{AdaptiveInterval, Flusher, UploadWorker};
