//! # Beacon Domain
//!
//! Business domain types for the Beacon telemetry core.
//!
//! This crate contains:
//! - Raw event and finished record types
//! - Context and attribute types shared across the scope hierarchy
//! - Delivery types (batches, upload status, connectivity/power state)
//! - Domain error types and Result definitions
//! - Configuration structures with documented defaults
//!
//! ## Architecture
//! - No dependencies on other Beacon crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
