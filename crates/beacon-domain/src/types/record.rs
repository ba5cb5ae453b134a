//! Finished analytics records emitted by the scope hierarchy.
//!
//! Records are immutable value objects produced exactly once per logical
//! instance, except `ViewRecord` which is re-emitted with an incrementing
//! `version` every time the owning view's visible state changes (the
//! collector keeps only the highest version per view id).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::Attributes;
use super::event::{ActionType, ErrorSource, ResourceKind, ResourceTiming};

/// Discriminant for the record union, used in delivery-outcome bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    View,
    Action,
    Resource,
    Error,
    LongTask,
}

/// Classification of a network destination provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    FirstParty,
}

/// Provider attached to resource/error records for first-party hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceProvider {
    pub domain: String,
    pub provider_type: ProviderType,
}

/// Snapshot of a view's visible state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewRecord {
    pub application_id: String,
    pub session_id: String,
    pub view_id: String,
    pub key: String,
    pub name: String,
    /// Document version; strictly increasing per view id
    pub version: u64,
    pub is_active: bool,
    pub timestamp: DateTime<Utc>,
    pub time_spent_ns: i64,
    pub action_count: u32,
    pub resource_count: u32,
    pub error_count: u32,
    pub crash_count: u32,
    pub long_task_count: u32,
    pub attributes: Attributes,
}

/// One finished user-interaction window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub application_id: String,
    pub session_id: String,
    pub view_id: String,
    pub action_id: String,
    pub action_type: ActionType,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ns: i64,
    pub resource_count: u32,
    pub error_count: u32,
    pub crash_count: u32,
    pub long_task_count: u32,
    pub attributes: Attributes,
}

/// One completed network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub application_id: String,
    pub session_id: String,
    pub view_id: String,
    pub action_id: Option<String>,
    pub resource_id: String,
    pub url: String,
    pub method: String,
    pub kind: ResourceKind,
    pub status_code: Option<u32>,
    pub size: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub duration_ns: i64,
    pub timing: Option<ResourceTiming>,
    pub provider: Option<ResourceProvider>,
    pub attributes: Attributes,
}

/// Resource details attached to an error raised by `StopResourceWithError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResource {
    pub url: String,
    pub method: String,
    pub status_code: Option<u32>,
}

/// One observed error, fatal or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub application_id: String,
    pub session_id: String,
    pub view_id: String,
    pub action_id: Option<String>,
    pub error_id: String,
    pub message: String,
    pub source: ErrorSource,
    pub error_type: Option<String>,
    pub stacktrace: Option<String>,
    pub is_crash: bool,
    pub resource: Option<ErrorResource>,
    pub provider: Option<ResourceProvider>,
    pub timestamp: DateTime<Utc>,
    pub attributes: Attributes,
}

/// One main-thread stall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTaskRecord {
    pub application_id: String,
    pub session_id: String,
    pub view_id: String,
    pub action_id: Option<String>,
    pub long_task_id: String,
    pub duration_ns: i64,
    pub timestamp: DateTime<Utc>,
    pub attributes: Attributes,
}

/// Union of every finished record handed to the delivery pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RumRecord {
    View(ViewRecord),
    Action(ActionRecord),
    Resource(ResourceRecord),
    Error(ErrorRecord),
    LongTask(LongTaskRecord),
}

impl RumRecord {
    /// Discriminant of this record.
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::View(_) => RecordKind::View,
            Self::Action(_) => RecordKind::Action,
            Self::Resource(_) => RecordKind::Resource,
            Self::Error(_) => RecordKind::Error,
            Self::LongTask(_) => RecordKind::LongTask,
        }
    }

    /// Id of the view that owns this record.
    pub fn view_id(&self) -> &str {
        match self {
            Self::View(r) => &r.view_id,
            Self::Action(r) => &r.view_id,
            Self::Resource(r) => &r.view_id,
            Self::Error(r) => &r.view_id,
            Self::LongTask(r) => &r.view_id,
        }
    }

    /// Session the record belongs to.
    pub fn session_id(&self) -> &str {
        match self {
            Self::View(r) => &r.session_id,
            Self::Action(r) => &r.session_id,
            Self::Resource(r) => &r.session_id,
            Self::Error(r) => &r.session_id,
            Self::LongTask(r) => &r.session_id,
        }
    }
}
