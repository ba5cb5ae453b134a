//! Action scope: tracks one user-interaction window and aggregates whatever
//! happens inside it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use beacon_domain::{
    ActionRecord, ActionType, Attributes, ResourceKey, RumContext, RumRawEvent, RumRecord,
};
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::{elapsed_ns, exceeds, ScopeState};
use crate::attributes::GlobalAttributes;
use crate::ports::RecordWriter;

/// What a closing action reported to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSignal {
    /// An action record was produced
    Emitted,
    /// The action expired with nothing worth reporting; bookkeeping only
    Dropped,
}

/// Result of one event applied to an action scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionResult {
    pub state: ScopeState,
    pub signal: Option<ActionSignal>,
}

impl ActionResult {
    fn open() -> Self {
        Self { state: ScopeState::Open, signal: None }
    }
}

/// One user-interaction window.
///
/// Closes on the first of: matching explicit stop, fatal error, inactivity,
/// or hard max duration. Emits a record only when something qualifying
/// happened inside the window or the close was explicit.
pub struct ActionScope {
    context: RumContext,
    action_id: String,
    action_type: ActionType,
    name: String,
    continuous: bool,
    start_time: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    /// Keys of resources that started while this action was open; only
    /// their stops count as activity inside the window
    open_resources: HashSet<ResourceKey>,
    resource_count: u32,
    error_count: u32,
    crash_count: u32,
    long_task_count: u32,
    view_tree_changes: u32,
    attributes: Attributes,
    globals: Arc<GlobalAttributes>,
    inactivity_threshold: Duration,
    max_duration: Duration,
}

impl ActionScope {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: RumContext,
        action_type: ActionType,
        name: String,
        continuous: bool,
        attributes: Attributes,
        start_time: DateTime<Utc>,
        globals: Arc<GlobalAttributes>,
        inactivity_threshold: Duration,
        max_duration: Duration,
    ) -> Self {
        Self {
            context,
            action_id: Uuid::new_v4().to_string(),
            action_type,
            name,
            continuous,
            start_time,
            last_activity: start_time,
            open_resources: HashSet::new(),
            resource_count: 0,
            error_count: 0,
            crash_count: 0,
            long_task_count: 0,
            view_tree_changes: 0,
            attributes,
            globals,
            inactivity_threshold,
            max_duration,
        }
    }

    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    /// Apply one event.
    ///
    /// Time-based closes are evaluated lazily here, against the event's
    /// timestamp; an event that trips a timeout closes the scope without
    /// being counted into it.
    pub fn handle_event(&mut self, event: &RumRawEvent, writer: &dyn RecordWriter) -> ActionResult {
        let now = event.time();

        if exceeds(self.last_activity, now, self.inactivity_threshold) {
            return self.finish(self.last_activity, false, writer);
        }
        if exceeds(self.start_time, now, self.max_duration) {
            let end = self.start_time
                + chrono::Duration::from_std(self.max_duration)
                    .unwrap_or_else(|_| chrono::Duration::zero());
            return self.finish(end, false, writer);
        }

        match event {
            RumRawEvent::StopAction { action_type, name, attributes, time } => {
                let type_matches = action_type.map_or(true, |t| t == self.action_type);
                let name_matches = name.as_ref().map_or(true, |n| *n == self.name);
                if !self.continuous && type_matches && name_matches {
                    self.attributes
                        .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
                    return self.finish(*time, true, writer);
                }
                ActionResult::open()
            }
            RumRawEvent::SendActionNow { time } => self.finish(*time, true, writer),
            RumRawEvent::AddError { is_fatal, time, .. } => {
                self.error_count += 1;
                if *is_fatal {
                    self.crash_count += 1;
                    // A crash forces immediate close regardless of other state.
                    return self.finish(*time, true, writer);
                }
                self.last_activity = now;
                ActionResult::open()
            }
            RumRawEvent::StartResource { key, .. } => {
                self.open_resources.insert(*key);
                self.last_activity = now;
                ActionResult::open()
            }
            // A stop whose start this action never saw is someone else's
            // resource (or a stale key); it is not activity in this window.
            RumRawEvent::StopResource { key, .. } => {
                if self.open_resources.remove(key) {
                    self.resource_count += 1;
                    self.last_activity = now;
                }
                ActionResult::open()
            }
            RumRawEvent::StopResourceWithError { key, .. } => {
                if self.open_resources.remove(key) {
                    self.error_count += 1;
                    self.last_activity = now;
                }
                ActionResult::open()
            }
            RumRawEvent::AddLongTask { .. } => {
                self.long_task_count += 1;
                self.last_activity = now;
                ActionResult::open()
            }
            RumRawEvent::ViewTreeChanged { .. } => {
                self.view_tree_changes += 1;
                self.last_activity = now;
                ActionResult::open()
            }
            _ => ActionResult::open(),
        }
    }

    /// Close forcibly, as when a new action starts or the view stops.
    pub fn force_close(&mut self, time: DateTime<Utc>, writer: &dyn RecordWriter) -> ActionResult {
        self.finish(time, true, writer)
    }

    fn finish(
        &mut self,
        end_time: DateTime<Utc>,
        explicit: bool,
        writer: &dyn RecordWriter,
    ) -> ActionResult {
        let has_activity =
            self.resource_count > 0 || self.error_count > 0 || self.view_tree_changes > 0;

        if !explicit && !has_activity {
            debug!(name = %self.name, "action expired with no activity; dropping");
            return ActionResult { state: ScopeState::Closed, signal: Some(ActionSignal::Dropped) };
        }

        let record = ActionRecord {
            application_id: self.context.application_id.clone(),
            session_id: self.context.session_id.clone(),
            view_id: self.context.view_id.clone().unwrap_or_default(),
            action_id: self.action_id.clone(),
            action_type: self.action_type,
            name: self.name.clone(),
            timestamp: self.start_time,
            duration_ns: elapsed_ns(self.start_time, end_time),
            resource_count: self.resource_count,
            error_count: self.error_count,
            crash_count: self.crash_count,
            long_task_count: self.long_task_count,
            attributes: self.globals.merged_with(&self.attributes),
        };

        debug!(name = %self.name, resources = self.resource_count, "action scope completed");
        if self.context.session_sampled {
            writer.write(RumRecord::Action(record));
        }
        ActionResult { state: ScopeState::Closed, signal: Some(ActionSignal::Emitted) }
    }
}
