//! View scope: tracks the currently active screen and owns the action and
//! resource scopes nested inside it.

use std::collections::HashMap;
use std::sync::Arc;

use beacon_domain::{
    Attributes, ErrorRecord, LongTaskRecord, RecordKind, ResourceKey, RumConfig, RumContext,
    RumRawEvent, RumRecord, ViewRecord,
};
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::action::{ActionScope, ActionSignal};
use super::resource::ResourceScope;
use super::{elapsed_ns, ScopeState};
use crate::attributes::GlobalAttributes;
use crate::ports::{FirstPartyHostDetector, RecordWriter};

/// Result of one event applied to a view scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewResult {
    pub state: ScopeState,
    /// Actions that expired with nothing to report while handling this event
    pub dropped_actions: u32,
}

/// The active screen: owns zero-or-one action scope and any number of
/// concurrently in-flight resource scopes.
///
/// Every state-affecting event re-emits the view record with an incremented
/// document version; the collector keeps only the highest version per view id
/// (upsert model).
pub struct ViewScope {
    context: RumContext,
    view_id: String,
    key: String,
    name: String,
    start_time: DateTime<Utc>,
    version: u64,
    is_active: bool,
    action: Option<ActionScope>,
    resources: HashMap<ResourceKey, ResourceScope>,
    action_count: u32,
    resource_count: u32,
    error_count: u32,
    crash_count: u32,
    long_task_count: u32,
    attributes: Attributes,
    globals: Arc<GlobalAttributes>,
    detector: Arc<dyn FirstPartyHostDetector>,
    config: Arc<RumConfig>,
}

impl ViewScope {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        parent_context: &RumContext,
        key: String,
        name: String,
        attributes: Attributes,
        start_time: DateTime<Utc>,
        globals: Arc<GlobalAttributes>,
        detector: Arc<dyn FirstPartyHostDetector>,
        config: Arc<RumConfig>,
    ) -> Self {
        let view_id = Uuid::new_v4().to_string();
        let context = RumContext {
            view_id: Some(view_id.clone()),
            action_id: None,
            ..parent_context.clone()
        };
        Self {
            context,
            view_id,
            key,
            name,
            start_time,
            version: 0,
            is_active: true,
            action: None,
            resources: HashMap::new(),
            action_count: 0,
            resource_count: 0,
            error_count: 0,
            crash_count: 0,
            long_task_count: 0,
            attributes,
            globals,
            detector,
            config,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn view_id(&self) -> &str {
        &self.view_id
    }

    /// Emit the first snapshot (version 1) right after the view starts.
    pub fn start(&mut self, writer: &dyn RecordWriter) {
        self.emit_view_update(self.start_time, writer);
    }

    /// Context handed to child scopes; carries the active action id, if any.
    fn child_context(&self) -> RumContext {
        RumContext {
            action_id: self.action.as_ref().map(|a| a.action_id().to_string()),
            ..self.context.clone()
        }
    }

    /// Apply one event: forward to children first, then handle view-level
    /// effects, then re-emit the view snapshot if visible state changed.
    pub fn handle_event(&mut self, event: &RumRawEvent, writer: &dyn RecordWriter) -> ViewResult {
        let mut dropped_actions = 0;
        let mut dirty = false;
        // Captured before forwarding: a fatal error closes the action it
        // belongs to, and the error record must still carry that action's id.
        let action_id = self.action.as_ref().map(|a| a.action_id().to_string());

        // Action lifecycle + count forwarding.
        if let RumRawEvent::StartAction { action_type, name, continuous, attributes, time } = event
        {
            if self.is_active {
                if let Some(action) = self.action.as_mut() {
                    // A new action preempts the old one.
                    let closed = action.force_close(*time, writer);
                    match closed.signal {
                        Some(ActionSignal::Emitted) => self.action_count += 1,
                        Some(ActionSignal::Dropped) => dropped_actions += 1,
                        None => {}
                    }
                    self.action = None;
                }
                self.action = Some(ActionScope::new(
                    self.context.clone(),
                    *action_type,
                    name.clone(),
                    *continuous,
                    attributes.clone(),
                    *time,
                    Arc::clone(&self.globals),
                    self.config.action_inactivity_threshold,
                    self.config.action_max_duration,
                ));
                debug!(view = %self.name, action = %name, "action started");
                dirty = true;
            }
        } else if let Some(action) = self.action.as_mut() {
            let result = action.handle_event(event, writer);
            if result.state == ScopeState::Closed {
                self.action = None;
                match result.signal {
                    Some(ActionSignal::Emitted) => {
                        self.action_count += 1;
                        dirty = true;
                    }
                    Some(ActionSignal::Dropped) => dropped_actions += 1,
                    None => {}
                }
            }
        }

        // Resource scopes, keyed by exact handle equality.
        match event {
            RumRawEvent::StartResource { key, url, method, attributes, time } => {
                if self.is_active {
                    self.resources.insert(
                        *key,
                        ResourceScope::new(
                            *key,
                            self.child_context(),
                            url.clone(),
                            method.clone(),
                            attributes.clone(),
                            *time,
                            Arc::clone(&self.globals),
                            Arc::clone(&self.detector),
                        ),
                    );
                    dirty = true;
                }
            }
            RumRawEvent::StopResource { key, .. }
            | RumRawEvent::StopResourceWithError { key, .. }
            | RumRawEvent::AddResourceTiming { key, .. }
            | RumRawEvent::WaitForResourceTiming { key, .. } => {
                if let Some(resource) = self.resources.get_mut(key) {
                    let result = resource.handle_event(event, writer);
                    if result.state == ScopeState::Closed {
                        self.resources.remove(key);
                        match result.emitted {
                            Some(RecordKind::Resource) => self.resource_count += 1,
                            Some(RecordKind::Error) => self.error_count += 1,
                            _ => {}
                        }
                        dirty = true;
                    }
                }
            }
            _ => {}
        }

        // View-level effects.
        match event {
            RumRawEvent::AddError { message, source, error_type, stacktrace, is_fatal, attributes, time } => {
                if self.is_active {
                    self.emit_error(
                        message.clone(),
                        *source,
                        error_type.clone(),
                        stacktrace.clone(),
                        *is_fatal,
                        action_id.clone(),
                        attributes.clone(),
                        *time,
                        writer,
                    );
                    self.error_count += 1;
                    if *is_fatal {
                        self.crash_count += 1;
                    }
                    dirty = true;
                }
            }
            RumRawEvent::AddLongTask { duration_ns, attributes, time } => {
                if self.is_active {
                    self.emit_long_task(*duration_ns, attributes.clone(), *time, writer);
                    self.long_task_count += 1;
                    dirty = true;
                }
            }
            RumRawEvent::StopView { key, attributes, time } if *key == self.key => {
                if self.is_active {
                    if let Some(action) = self.action.as_mut() {
                        let closed = action.force_close(*time, writer);
                        match closed.signal {
                            Some(ActionSignal::Emitted) => self.action_count += 1,
                            Some(ActionSignal::Dropped) => dropped_actions += 1,
                            None => {}
                        }
                        self.action = None;
                    }
                    self.attributes
                        .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
                    self.is_active = false;
                    self.emit_view_update(*time, writer);
                    debug!(view = %self.name, "view scope stopped");
                    return ViewResult { state: ScopeState::Closed, dropped_actions };
                }
            }
            _ => {}
        }

        if dirty && self.is_active {
            self.emit_view_update(event.time(), writer);
        }

        ViewResult { state: ScopeState::Open, dropped_actions }
    }

    /// Force the view closed, as when a new view starts or the session renews.
    pub fn force_stop(&mut self, time: DateTime<Utc>, writer: &dyn RecordWriter) -> ViewResult {
        let stop = RumRawEvent::StopView { key: self.key.clone(), attributes: Attributes::new(), time };
        self.handle_event(&stop, writer)
    }

    fn emit_view_update(&mut self, now: DateTime<Utc>, writer: &dyn RecordWriter) {
        self.version += 1;
        let record = ViewRecord {
            application_id: self.context.application_id.clone(),
            session_id: self.context.session_id.clone(),
            view_id: self.view_id.clone(),
            key: self.key.clone(),
            name: self.name.clone(),
            version: self.version,
            is_active: self.is_active,
            timestamp: self.start_time,
            time_spent_ns: elapsed_ns(self.start_time, now),
            action_count: self.action_count,
            resource_count: self.resource_count,
            error_count: self.error_count,
            crash_count: self.crash_count,
            long_task_count: self.long_task_count,
            attributes: self.globals.merged_with(&self.attributes),
        };
        if self.context.session_sampled {
            writer.write(RumRecord::View(record));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_error(
        &self,
        message: String,
        source: beacon_domain::ErrorSource,
        error_type: Option<String>,
        stacktrace: Option<String>,
        is_fatal: bool,
        action_id: Option<String>,
        attributes: Attributes,
        time: DateTime<Utc>,
        writer: &dyn RecordWriter,
    ) {
        let record = ErrorRecord {
            application_id: self.context.application_id.clone(),
            session_id: self.context.session_id.clone(),
            view_id: self.view_id.clone(),
            action_id,
            error_id: Uuid::new_v4().to_string(),
            message,
            source,
            error_type,
            stacktrace,
            is_crash: is_fatal,
            resource: None,
            provider: None,
            timestamp: time,
            attributes: self.globals.merged_with(&attributes),
        };
        if self.context.session_sampled {
            writer.write(RumRecord::Error(record));
        }
    }

    fn emit_long_task(
        &self,
        duration_ns: i64,
        attributes: Attributes,
        time: DateTime<Utc>,
        writer: &dyn RecordWriter,
    ) {
        let record = LongTaskRecord {
            application_id: self.context.application_id.clone(),
            session_id: self.context.session_id.clone(),
            view_id: self.view_id.clone(),
            action_id: self.action.as_ref().map(|a| a.action_id().to_string()),
            long_task_id: Uuid::new_v4().to_string(),
            duration_ns,
            timestamp: time,
            attributes: self.globals.merged_with(&attributes),
        };
        if self.context.session_sampled {
            writer.write(RumRecord::LongTask(record));
        }
    }
}

#[cfg(test)]
mod tests {
    use beacon_domain::{ActionType, ErrorSource, ResourceKind};
    use parking_lot::Mutex;

    use super::*;
    use crate::ports::NoFirstPartyHosts;

    #[derive(Default)]
    struct CollectingWriter {
        records: Mutex<Vec<RumRecord>>,
    }

    impl RecordWriter for CollectingWriter {
        fn write(&self, record: RumRecord) {
            self.records.lock().push(record);
        }
    }

    impl CollectingWriter {
        fn view_versions(&self) -> Vec<u64> {
            self.records
                .lock()
                .iter()
                .filter_map(|r| match r {
                    RumRecord::View(v) => Some(v.version),
                    _ => None,
                })
                .collect()
        }
    }

    fn parent_context() -> RumContext {
        RumContext {
            application_id: "app-1".to_string(),
            session_id: "session-1".to_string(),
            view_id: None,
            action_id: None,
            session_sampled: true,
        }
    }

    fn view(start: DateTime<Utc>) -> ViewScope {
        ViewScope::new(
            &parent_context(),
            "screen/home".to_string(),
            "Home".to_string(),
            Attributes::new(),
            start,
            Arc::new(GlobalAttributes::new()),
            Arc::new(NoFirstPartyHosts),
            Arc::new(RumConfig::new("app-1")),
        )
    }

    #[test]
    fn view_versions_are_strictly_increasing() {
        let start = Utc::now();
        let mut scope = view(start);
        let writer = CollectingWriter::default();

        let key = ResourceKey::next();
        scope.handle_event(
            &RumRawEvent::StartResource {
                key,
                url: "https://api.example.com/a".to_string(),
                method: "GET".to_string(),
                attributes: Attributes::new(),
                time: start + chrono::Duration::milliseconds(5),
            },
            &writer,
        );
        scope.handle_event(
            &RumRawEvent::StopResource {
                key,
                status_code: Some(200),
                size: None,
                kind: ResourceKind::Fetch,
                attributes: Attributes::new(),
                time: start + chrono::Duration::milliseconds(30),
            },
            &writer,
        );
        scope.handle_event(
            &RumRawEvent::AddLongTask {
                duration_ns: 120_000_000,
                attributes: Attributes::new(),
                time: start + chrono::Duration::milliseconds(40),
            },
            &writer,
        );

        let versions = writer.view_versions();
        assert!(!versions.is_empty());
        for pair in versions.windows(2) {
            assert!(pair[1] > pair[0], "versions not strictly increasing: {versions:?}");
        }
    }

    #[test]
    fn completed_resource_bumps_view_counts() {
        let start = Utc::now();
        let mut scope = view(start);
        let writer = CollectingWriter::default();

        let key = ResourceKey::next();
        scope.handle_event(
            &RumRawEvent::StartResource {
                key,
                url: "https://api.example.com/a".to_string(),
                method: "GET".to_string(),
                attributes: Attributes::new(),
                time: start,
            },
            &writer,
        );
        scope.handle_event(
            &RumRawEvent::StopResource {
                key,
                status_code: Some(200),
                size: None,
                kind: ResourceKind::Xhr,
                attributes: Attributes::new(),
                time: start + chrono::Duration::milliseconds(10),
            },
            &writer,
        );

        let records = writer.records.lock();
        let last_view = records
            .iter()
            .rev()
            .find_map(|r| match r {
                RumRecord::View(v) => Some(v.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_view.resource_count, 1);
        assert_eq!(last_view.error_count, 0);
    }

    #[test]
    fn new_start_action_preempts_active_action() {
        let start = Utc::now();
        let mut scope = view(start);
        let writer = CollectingWriter::default();

        scope.handle_event(
            &RumRawEvent::StartAction {
                action_type: ActionType::Tap,
                name: "first".to_string(),
                continuous: false,
                attributes: Attributes::new(),
                time: start,
            },
            &writer,
        );
        scope.handle_event(
            &RumRawEvent::StartAction {
                action_type: ActionType::Tap,
                name: "second".to_string(),
                continuous: false,
                attributes: Attributes::new(),
                time: start + chrono::Duration::milliseconds(10),
            },
            &writer,
        );

        // First action force-closed and emitted before the second started.
        let actions: Vec<String> = writer
            .records
            .lock()
            .iter()
            .filter_map(|r| match r {
                RumRecord::Action(a) => Some(a.name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(actions, vec!["first".to_string()]);
    }

    #[test]
    fn stop_view_closes_scope_and_emits_final_inactive_record() {
        let start = Utc::now();
        let mut scope = view(start);
        let writer = CollectingWriter::default();

        let result = scope.handle_event(
            &RumRawEvent::StopView {
                key: "screen/home".to_string(),
                attributes: Attributes::new(),
                time: start + chrono::Duration::seconds(2),
            },
            &writer,
        );

        assert_eq!(result.state, ScopeState::Closed);
        let records = writer.records.lock();
        match records.last().unwrap() {
            RumRecord::View(v) => {
                assert!(!v.is_active);
                assert_eq!(v.time_spent_ns, 2_000_000_000);
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[test]
    fn stop_view_with_other_key_is_ignored() {
        let start = Utc::now();
        let mut scope = view(start);
        let writer = CollectingWriter::default();

        let result = scope.handle_event(
            &RumRawEvent::StopView {
                key: "screen/other".to_string(),
                attributes: Attributes::new(),
                time: start,
            },
            &writer,
        );

        assert_eq!(result.state, ScopeState::Open);
        assert!(writer.records.lock().is_empty());
    }

    #[test]
    fn fatal_error_bumps_crash_count() {
        let start = Utc::now();
        let mut scope = view(start);
        let writer = CollectingWriter::default();

        scope.handle_event(
            &RumRawEvent::AddError {
                message: "boom".to_string(),
                source: ErrorSource::Source,
                error_type: Some("SIGSEGV".to_string()),
                stacktrace: None,
                is_fatal: true,
                attributes: Attributes::new(),
                time: start + chrono::Duration::milliseconds(5),
            },
            &writer,
        );

        let records = writer.records.lock();
        assert!(records.iter().any(|r| matches!(r, RumRecord::Error(e) if e.is_crash)));
        let last_view = records
            .iter()
            .rev()
            .find_map(|r| match r {
                RumRecord::View(v) => Some(v.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_view.crash_count, 1);
        assert_eq!(last_view.error_count, 1);
    }

    #[test]
    fn crash_stays_attributed_to_the_action_it_closed() {
        let start = Utc::now();
        let mut scope = view(start);
        let writer = CollectingWriter::default();

        scope.handle_event(
            &RumRawEvent::StartAction {
                action_type: ActionType::Tap,
                name: "submit".to_string(),
                continuous: false,
                attributes: Attributes::new(),
                time: start,
            },
            &writer,
        );
        scope.handle_event(
            &RumRawEvent::AddError {
                message: "segfault".to_string(),
                source: ErrorSource::Source,
                error_type: None,
                stacktrace: None,
                is_fatal: true,
                attributes: Attributes::new(),
                time: start + chrono::Duration::milliseconds(20),
            },
            &writer,
        );

        let records = writer.records.lock();
        let action = records
            .iter()
            .find_map(|r| match r {
                RumRecord::Action(a) => Some(a.clone()),
                _ => None,
            })
            .unwrap();
        let error = records
            .iter()
            .find_map(|r| match r {
                RumRecord::Error(e) => Some(e.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(error.action_id.as_deref(), Some(action.action_id.as_str()));
    }

    #[test]
    fn dropped_action_is_reported_to_parent_not_written() {
        let start = Utc::now();
        let mut scope = view(start);
        let writer = CollectingWriter::default();

        scope.handle_event(
            &RumRawEvent::StartAction {
                action_type: ActionType::Tap,
                name: "idle".to_string(),
                continuous: false,
                attributes: Attributes::new(),
                time: start,
            },
            &writer,
        );
        let before = writer.records.lock().len();

        // Inactivity elapses with zero nested activity.
        let result = scope.handle_event(
            &RumRawEvent::KeepAlive { time: start + chrono::Duration::seconds(1) },
            &writer,
        );

        assert_eq!(result.dropped_actions, 1);
        let records = writer.records.lock();
        assert!(records[before..].iter().all(|r| !matches!(r, RumRecord::Action(_))));
    }
}
