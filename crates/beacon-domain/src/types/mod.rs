//! Domain data types
//!
//! Raw events flow into the scope hierarchy; finished records flow out of it
//! toward the delivery pipeline; delivery types describe batches in flight.

pub mod context;
pub mod event;
pub mod record;
pub mod upload;

pub use context::{Attributes, RumContext};
pub use event::{
    ActionType, ErrorSource, ResourceKey, ResourceKind, ResourceTiming, RumRawEvent,
};
pub use record::{
    ActionRecord, ErrorRecord, ErrorResource, LongTaskRecord, ProviderType, RecordKind,
    ResourceProvider, ResourceRecord, RumRecord, ViewRecord,
};
pub use upload::{Batch, Category, ConnectivityStatus, NetworkKind, PowerState, UploadStatus};
