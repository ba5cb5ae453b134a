//! # Beacon Core
//!
//! Pure aggregation logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - The scope hierarchy (application -> session -> view -> action/resource)
//! - The monitor facade serializing raw events onto a single worker
//! - Port/adapter interfaces (traits) for storage, delivery and device state
//!
//! ## Architecture Principles
//! - Only depends on `beacon-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Handling an event is synchronous and non-blocking

pub mod attributes;
pub mod monitor;
pub mod ports;
pub mod scopes;

// Re-export specific items to avoid ambiguity
pub use attributes::GlobalAttributes;
pub use monitor::{MonitorStatsSnapshot, RumMonitor};
pub use ports::{
    BatchStore, ConnectivityProvider, EventSink, FirstPartyHostDetector, NoFirstPartyHosts,
    PowerStateProvider, RecordWriter, UploadClient,
};
pub use scopes::application::ApplicationScope;
