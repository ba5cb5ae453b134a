//! Raw event union consumed by the scope hierarchy

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::Attributes;
use super::record::RecordKind;

/// Opaque handle identifying one in-flight network resource.
///
/// Handles are minted from a process-wide counter and handed back to the
/// caller on `start_resource`. A stale or unknown handle never matches any
/// scope again; events carrying one are absorbed as no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey(u64);

static NEXT_RESOURCE_KEY: AtomicU64 = AtomicU64::new(1);

impl ResourceKey {
    /// Mint a fresh key.
    pub fn next() -> Self {
        Self(NEXT_RESOURCE_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value, for logging only.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Kind of user interaction behind an action scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Tap,
    Click,
    Scroll,
    Swipe,
    Back,
    Custom,
}

/// Classification of a finished network resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Document,
    Xhr,
    Fetch,
    Image,
    Js,
    Css,
    Font,
    Media,
    Native,
    Other,
}

/// Where an error was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    Network,
    Source,
    Console,
    Logger,
    Webview,
    Custom,
}

/// Explicit network timing attached to a resource via `AddResourceTiming`.
///
/// All phases are durations in nanoseconds; absent phases were not observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTiming {
    pub dns_ns: Option<i64>,
    pub connect_ns: Option<i64>,
    pub ssl_ns: Option<i64>,
    pub first_byte_ns: Option<i64>,
    pub download_ns: Option<i64>,
}

/// Everything that can happen, as seen by the aggregation engine.
///
/// Events are immutable once constructed and owned transiently by the
/// dispatch path. Each carries the caller-supplied (or current) timestamp.
#[derive(Debug, Clone)]
pub enum RumRawEvent {
    StartView {
        key: String,
        name: String,
        attributes: Attributes,
        time: DateTime<Utc>,
    },
    StopView {
        key: String,
        attributes: Attributes,
        time: DateTime<Utc>,
    },
    StartAction {
        action_type: ActionType,
        name: String,
        /// Pressed-and-held interactions stay open until an explicit stop
        continuous: bool,
        attributes: Attributes,
        time: DateTime<Utc>,
    },
    StopAction {
        action_type: Option<ActionType>,
        name: Option<String>,
        attributes: Attributes,
        time: DateTime<Utc>,
    },
    /// Force a continuous/custom action to close and emit immediately.
    SendActionNow { time: DateTime<Utc> },
    StartResource {
        key: ResourceKey,
        url: String,
        method: String,
        attributes: Attributes,
        time: DateTime<Utc>,
    },
    StopResource {
        key: ResourceKey,
        status_code: Option<u32>,
        size: Option<u64>,
        kind: ResourceKind,
        attributes: Attributes,
        time: DateTime<Utc>,
    },
    StopResourceWithError {
        key: ResourceKey,
        status_code: Option<u32>,
        message: String,
        source: ErrorSource,
        error_type: Option<String>,
        attributes: Attributes,
        time: DateTime<Utc>,
    },
    AddError {
        message: String,
        source: ErrorSource,
        error_type: Option<String>,
        stacktrace: Option<String>,
        is_fatal: bool,
        attributes: Attributes,
        time: DateTime<Utc>,
    },
    AddLongTask {
        duration_ns: i64,
        attributes: Attributes,
        time: DateTime<Utc>,
    },
    AddResourceTiming {
        key: ResourceKey,
        timing: ResourceTiming,
        time: DateTime<Utc>,
    },
    /// Defer the matching resource's terminal emission until timing lands.
    WaitForResourceTiming { key: ResourceKey, time: DateTime<Utc> },
    /// Layout changed; used only as a "still active" signal for actions.
    ViewTreeChanged { time: DateTime<Utc> },
    ResetSession { time: DateTime<Utc> },
    /// Synthetic heartbeat driving lazy time-based scope transitions.
    KeepAlive { time: DateTime<Utc> },
    /// Delivery-outcome notification: a record reached the batch store.
    RecordSent {
        view_id: String,
        kind: RecordKind,
        time: DateTime<Utc>,
    },
    /// Delivery-outcome notification: a record was lost before storage.
    RecordDropped {
        view_id: String,
        kind: RecordKind,
        time: DateTime<Utc>,
    },
}

impl RumRawEvent {
    /// Timestamp carried by the event.
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Self::StartView { time, .. }
            | Self::StopView { time, .. }
            | Self::StartAction { time, .. }
            | Self::StopAction { time, .. }
            | Self::SendActionNow { time }
            | Self::StartResource { time, .. }
            | Self::StopResource { time, .. }
            | Self::StopResourceWithError { time, .. }
            | Self::AddError { time, .. }
            | Self::AddLongTask { time, .. }
            | Self::AddResourceTiming { time, .. }
            | Self::WaitForResourceTiming { time, .. }
            | Self::ViewTreeChanged { time }
            | Self::ResetSession { time }
            | Self::KeepAlive { time }
            | Self::RecordSent { time, .. }
            | Self::RecordDropped { time, .. } => *time,
        }
    }

    /// True for events that renew session activity tracking.
    ///
    /// Keep-alive heartbeats and delivery-outcome notifications are
    /// bookkeeping; they must not keep an otherwise idle session alive.
    pub fn is_user_interaction(&self) -> bool {
        !matches!(
            self,
            Self::KeepAlive { .. } | Self::RecordSent { .. } | Self::RecordDropped { .. }
        )
    }
}
