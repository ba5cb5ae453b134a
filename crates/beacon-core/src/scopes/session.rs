//! Session scope: decides session continuation vs. renewal and owns the
//! current view scope.

use std::sync::Arc;

use beacon_domain::{RumConfig, RumContext, RumRawEvent};
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use super::view::ViewScope;
use super::{exceeds, ScopeState};
use crate::attributes::GlobalAttributes;
use crate::ports::{FirstPartyHostDetector, RecordWriter};

/// Result of one event applied to a session scope.
///
/// Sessions never close; they renew in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionResult {
    pub dropped_actions: u32,
}

/// Owns the current view scope and the per-session sampling decision.
pub struct SessionScope {
    context: RumContext,
    session_start: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    view: Option<ViewScope>,
    config: Arc<RumConfig>,
    globals: Arc<GlobalAttributes>,
    detector: Arc<dyn FirstPartyHostDetector>,
}

impl SessionScope {
    pub fn new(
        parent_context: &RumContext,
        start_time: DateTime<Utc>,
        config: Arc<RumConfig>,
        globals: Arc<GlobalAttributes>,
        detector: Arc<dyn FirstPartyHostDetector>,
    ) -> Self {
        let mut scope = Self {
            context: parent_context.clone(),
            session_start: start_time,
            last_activity: start_time,
            view: None,
            config,
            globals,
            detector,
        };
        scope.assign_new_session(start_time);
        scope
    }

    pub fn session_id(&self) -> &str {
        &self.context.session_id
    }

    pub fn is_sampled(&self) -> bool {
        self.context.session_sampled
    }

    /// Apply one event, renewing the session first if it has expired.
    pub fn handle_event(
        &mut self,
        event: &RumRawEvent,
        writer: &dyn RecordWriter,
    ) -> SessionResult {
        let now = event.time();
        let mut result = SessionResult::default();

        if matches!(event, RumRawEvent::ResetSession { .. }) {
            self.renew(now, writer, &mut result);
            return result;
        }

        if event.is_user_interaction() {
            let timed_out = exceeds(self.last_activity, now, self.config.session_inactivity_timeout)
                || exceeds(self.session_start, now, self.config.session_max_duration);
            if timed_out {
                self.renew(now, writer, &mut result);
            }
            self.last_activity = now;
        }

        if let RumRawEvent::StartView { key, name, attributes, time } = event {
            if let Some(view) = self.view.as_mut() {
                // One current view at a time: finalize the old one first.
                let closed = view.force_stop(*time, writer);
                result.dropped_actions += closed.dropped_actions;
            }
            let mut view = ViewScope::new(
                &self.context,
                key.clone(),
                name.clone(),
                attributes.clone(),
                *time,
                Arc::clone(&self.globals),
                Arc::clone(&self.detector),
                Arc::clone(&self.config),
            );
            view.start(writer);
            self.view = Some(view);
            debug!(session = %self.context.session_id, view = %name, "view started");
            return result;
        }

        match self.view.as_mut() {
            Some(view) => {
                let view_result = view.handle_event(event, writer);
                result.dropped_actions += view_result.dropped_actions;
                if view_result.state == ScopeState::Closed {
                    self.view = None;
                }
            }
            None => self.handle_orphan(event, writer),
        }

        result
    }

    /// Events arriving with no active view are absorbed, except a crash:
    /// the fatal record must reach the writer even without a view.
    fn handle_orphan(&self, event: &RumRawEvent, writer: &dyn RecordWriter) {
        if let RumRawEvent::AddError {
            message,
            source,
            error_type,
            stacktrace,
            is_fatal: true,
            attributes,
            time,
        } = event
        {
            let record = beacon_domain::ErrorRecord {
                application_id: self.context.application_id.clone(),
                session_id: self.context.session_id.clone(),
                view_id: String::new(),
                action_id: None,
                error_id: Uuid::new_v4().to_string(),
                message: message.clone(),
                source: *source,
                error_type: error_type.clone(),
                stacktrace: stacktrace.clone(),
                is_crash: true,
                resource: None,
                provider: None,
                timestamp: *time,
                attributes: self.globals.merged_with(attributes),
            };
            if self.context.session_sampled {
                writer.write(beacon_domain::RumRecord::Error(record));
            }
        } else if event.is_user_interaction()
            && !matches!(event, RumRawEvent::StopView { .. } | RumRawEvent::StopAction { .. })
        {
            debug!("event arrived with no active view; absorbed");
        }
    }

    fn renew(&mut self, now: DateTime<Utc>, writer: &dyn RecordWriter, result: &mut SessionResult) {
        if let Some(view) = self.view.as_mut() {
            let closed = view.force_stop(now, writer);
            result.dropped_actions += closed.dropped_actions;
        }
        self.view = None;
        self.assign_new_session(now);
    }

    fn assign_new_session(&mut self, now: DateTime<Utc>) {
        self.context.session_id = Uuid::new_v4().to_string();
        self.context.session_sampled =
            rand::thread_rng().gen_range(0.0..100.0) < self.config.sample_rate;
        self.session_start = now;
        self.last_activity = now;
        info!(
            session = %self.context.session_id,
            sampled = self.context.session_sampled,
            "session renewed"
        );
    }
}
