//! Upload pipeline: adaptive per-category workers plus the shutdown flusher.

pub mod backoff;
pub mod flusher;
pub mod worker;

pub use backoff::AdaptiveInterval;
pub use flusher::Flusher;
pub use worker::UploadWorker;
