//! Port interfaces for storage, delivery and device-state collaborators
//!
//! Aggregation-side ports (`RecordWriter`, `EventSink`,
//! `FirstPartyHostDetector`) are synchronous: they are called from scope
//! logic, which never blocks. Delivery-side ports are async and consumed by
//! the upload workers.

use async_trait::async_trait;
use beacon_domain::{
    Batch, ConnectivityStatus, PowerState, Result, RumRawEvent, RumRecord, UploadStatus,
};

/// Hands finished records to the delivery pipeline.
///
/// Writes are fire-and-forget from the scope's point of view: persistence
/// failures are logged by the implementation and the record is lost, never
/// retried, never surfaced to the host app.
pub trait RecordWriter: Send + Sync {
    /// Accept a finished record for storage.
    fn write(&self, record: RumRecord);
}

/// Accepts raw events for processing.
///
/// Implemented by the monitor facade; used by the delivery side to feed
/// record-sent/record-dropped notifications back into the scope tree.
pub trait EventSink: Send + Sync {
    /// Submit an event for serialized processing.
    fn submit(&self, event: RumRawEvent);
}

/// Classifies URLs as first-party (the host app's own backend) or not.
pub trait FirstPartyHostDetector: Send + Sync {
    /// Whether the given URL targets a first-party host.
    fn is_first_party(&self, url: &str) -> bool;
}

/// Detector that never matches; the default when no hosts are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFirstPartyHosts;

impl FirstPartyHostDetector for NoFirstPartyHosts {
    fn is_first_party(&self, _url: &str) -> bool {
        false
    }
}

/// Append-only persistence for serialized records plus batch-level delivery
/// operations.
///
/// A locked batch cannot be obtained by a second reader until it is released
/// or dropped.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Append one serialized record to the current batch.
    async fn write(&self, data: Vec<u8>) -> Result<()>;

    /// Lock and return the next batch ready for upload, if any.
    async fn lock_next(&self) -> Result<Option<Batch>>;

    /// Unlock a batch, retaining it for a later cycle.
    async fn release(&self, batch: Batch) -> Result<()>;

    /// Permanently remove a batch.
    async fn drop_batch(&self, batch: Batch) -> Result<()>;

    /// Every unlocked batch, for a best-effort flush. Batches locked by an
    /// in-flight upload are excluded.
    async fn list_flushable(&self) -> Result<Vec<Batch>>;
}

/// Uploads one batch payload to the collector.
#[async_trait]
pub trait UploadClient: Send + Sync {
    /// Attempt delivery and classify the outcome.
    async fn upload(&self, data: &[u8]) -> UploadStatus;
}

/// Latest-known connectivity, as reported by the host platform.
pub trait ConnectivityProvider: Send + Sync {
    fn latest_connectivity(&self) -> ConnectivityStatus;
}

/// Latest-known power state, as reported by the host platform.
pub trait PowerStateProvider: Send + Sync {
    fn latest_power_state(&self) -> PowerState;
}
