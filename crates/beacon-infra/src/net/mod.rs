//! Network adapters for batch delivery.

pub mod client;

pub use client::{HttpUploadClient, HttpUploadClientBuilder};
