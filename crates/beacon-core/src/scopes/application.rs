//! Application scope: process-lifetime root of the hierarchy.

use std::sync::Arc;

use beacon_domain::{RumConfig, RumContext, RumRawEvent};
use tracing::debug;

use super::session::{SessionResult, SessionScope};
use crate::attributes::GlobalAttributes;
use crate::ports::{FirstPartyHostDetector, RecordWriter};

/// Result bubbled up from one applied event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplicationResult {
    pub dropped_actions: u32,
}

/// Root scope; one instance per monitor facade.
///
/// Resolves the application id once at construction and never terminates.
/// The session scope is created lazily on the first event.
pub struct ApplicationScope {
    context: RumContext,
    session: Option<SessionScope>,
    config: Arc<RumConfig>,
    globals: Arc<GlobalAttributes>,
    detector: Arc<dyn FirstPartyHostDetector>,
}

impl ApplicationScope {
    pub fn new(
        config: Arc<RumConfig>,
        globals: Arc<GlobalAttributes>,
        detector: Arc<dyn FirstPartyHostDetector>,
    ) -> Self {
        let context = RumContext::new(config.application_id.clone());
        Self { context, session: None, config, globals, detector }
    }

    /// Apply one event to the tree.
    pub fn handle_event(
        &mut self,
        event: &RumRawEvent,
        writer: &dyn RecordWriter,
    ) -> ApplicationResult {
        let session = self.session.get_or_insert_with(|| {
            debug!(application = %self.context.application_id, "starting first session");
            SessionScope::new(
                &self.context,
                event.time(),
                Arc::clone(&self.config),
                Arc::clone(&self.globals),
                Arc::clone(&self.detector),
            )
        });

        let SessionResult { dropped_actions } = session.handle_event(event, writer);
        ApplicationResult { dropped_actions }
    }

    /// Current session id, if a session has started.
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(SessionScope::session_id)
    }
}
