//! Resource scope: tracks one in-flight network call from start to completion.

use std::sync::Arc;

use beacon_domain::{
    Attributes, ErrorRecord, ErrorResource, ErrorSource, ProviderType, RecordKind, ResourceKey,
    ResourceKind, ResourceProvider, ResourceRecord, ResourceTiming, RumContext, RumRawEvent,
    RumRecord,
};
use chrono::{DateTime, Utc};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::{elapsed_ns, ScopeState};
use crate::attributes::GlobalAttributes;
use crate::ports::{FirstPartyHostDetector, RecordWriter};

/// Result of one event applied to a resource scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceResult {
    pub state: ScopeState,
    /// Kind of record emitted while handling the event, if any
    pub emitted: Option<RecordKind>,
}

impl ResourceResult {
    fn open() -> Self {
        Self { state: ScopeState::Open, emitted: None }
    }

    fn closed(emitted: RecordKind) -> Self {
        Self { state: ScopeState::Closed, emitted: Some(emitted) }
    }
}

/// A stop event buffered while the scope waits for explicit timing.
#[derive(Debug, Clone)]
struct PendingStop {
    status_code: Option<u32>,
    size: Option<u64>,
    kind: ResourceKind,
    attributes: Attributes,
    time: DateTime<Utc>,
}

/// Tracks one network call keyed by an opaque [`ResourceKey`].
///
/// Events carrying a non-matching key are no-ops and leave the scope alive.
pub struct ResourceScope {
    key: ResourceKey,
    context: RumContext,
    resource_id: String,
    url: String,
    method: String,
    start_time: DateTime<Utc>,
    attributes: Attributes,
    timing: Option<ResourceTiming>,
    waiting_for_timing: bool,
    pending_stop: Option<PendingStop>,
    globals: Arc<GlobalAttributes>,
    detector: Arc<dyn FirstPartyHostDetector>,
}

impl ResourceScope {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: ResourceKey,
        context: RumContext,
        url: String,
        method: String,
        attributes: Attributes,
        start_time: DateTime<Utc>,
        globals: Arc<GlobalAttributes>,
        detector: Arc<dyn FirstPartyHostDetector>,
    ) -> Self {
        Self {
            key,
            context,
            resource_id: Uuid::new_v4().to_string(),
            url,
            method,
            start_time,
            attributes,
            timing: None,
            waiting_for_timing: false,
            pending_stop: None,
            globals,
            detector,
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.key
    }

    /// Apply one event; matching is by exact key equality.
    pub fn handle_event(&mut self, event: &RumRawEvent, writer: &dyn RecordWriter) -> ResourceResult {
        match event {
            RumRawEvent::WaitForResourceTiming { key, .. } if *key == self.key => {
                self.waiting_for_timing = true;
                ResourceResult::open()
            }
            RumRawEvent::AddResourceTiming { key, timing, .. } if *key == self.key => {
                self.timing = Some(timing.clone());
                self.waiting_for_timing = false;
                match self.pending_stop.take() {
                    Some(stop) => self.emit_resource(stop, writer),
                    None => ResourceResult::open(),
                }
            }
            RumRawEvent::StopResource { key, status_code, size, kind, attributes, time }
                if *key == self.key =>
            {
                let stop = PendingStop {
                    status_code: *status_code,
                    size: *size,
                    kind: *kind,
                    attributes: attributes.clone(),
                    time: *time,
                };
                if self.waiting_for_timing && self.timing.is_none() {
                    // Ready to close; completion deferred until timing lands.
                    self.pending_stop = Some(stop);
                    ResourceResult::open()
                } else {
                    self.emit_resource(stop, writer)
                }
            }
            RumRawEvent::StopResourceWithError {
                key,
                status_code,
                message,
                source,
                error_type,
                attributes,
                time,
            } if *key == self.key => self.emit_error(
                *status_code,
                message.clone(),
                *source,
                error_type.clone(),
                attributes.clone(),
                *time,
                writer,
            ),
            _ => ResourceResult::open(),
        }
    }

    fn emit_resource(&mut self, stop: PendingStop, writer: &dyn RecordWriter) -> ResourceResult {
        // Later-supplied stop attributes win over start-time ones.
        let mut attributes = self.attributes.clone();
        attributes.extend(stop.attributes);
        let attributes = self.globals.merged_with(&attributes);

        let record = ResourceRecord {
            application_id: self.context.application_id.clone(),
            session_id: self.context.session_id.clone(),
            view_id: self.context.view_id.clone().unwrap_or_default(),
            action_id: self.context.action_id.clone(),
            resource_id: self.resource_id.clone(),
            url: self.url.clone(),
            method: self.method.clone(),
            kind: stop.kind,
            status_code: stop.status_code,
            size: stop.size,
            timestamp: self.start_time,
            duration_ns: elapsed_ns(self.start_time, stop.time),
            timing: self.timing.clone(),
            provider: self.provider(),
            attributes,
        };

        debug!(key = self.key.as_u64(), url = %self.url, "resource scope completed");
        if self.context.session_sampled {
            writer.write(RumRecord::Resource(record));
        }
        ResourceResult::closed(RecordKind::Resource)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_error(
        &mut self,
        status_code: Option<u32>,
        message: String,
        source: ErrorSource,
        error_type: Option<String>,
        attributes: Attributes,
        time: DateTime<Utc>,
        writer: &dyn RecordWriter,
    ) -> ResourceResult {
        let mut merged = self.attributes.clone();
        merged.extend(attributes);
        let merged = self.globals.merged_with(&merged);

        let record = ErrorRecord {
            application_id: self.context.application_id.clone(),
            session_id: self.context.session_id.clone(),
            view_id: self.context.view_id.clone().unwrap_or_default(),
            action_id: self.context.action_id.clone(),
            error_id: Uuid::new_v4().to_string(),
            message,
            source,
            error_type,
            stacktrace: None,
            is_crash: false,
            resource: Some(ErrorResource {
                url: self.url.clone(),
                method: self.method.clone(),
                status_code,
            }),
            provider: self.provider(),
            timestamp: time,
            attributes: merged,
        };

        debug!(key = self.key.as_u64(), url = %self.url, "resource scope completed with error");
        if self.context.session_sampled {
            writer.write(RumRecord::Error(record));
        }
        ResourceResult::closed(RecordKind::Error)
    }

    /// First-party provider for the emitted record, if the detector matches.
    ///
    /// Malformed URLs fall back to the raw string as the domain.
    fn provider(&self) -> Option<ResourceProvider> {
        if !self.detector.is_first_party(&self.url) {
            return None;
        }
        let domain = Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_else(|| self.url.clone());
        Some(ResourceProvider { domain, provider_type: ProviderType::FirstParty })
    }
}
