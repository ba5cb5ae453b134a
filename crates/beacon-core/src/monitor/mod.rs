//! Monitor facade: the public entry point of the aggregation engine.
//!
//! All non-fatal events are funneled through an unbounded channel onto a
//! single worker task, which applies them to the scope tree one at a time.
//! The tree additionally sits behind a mutex because two paths apply events
//! from outside the worker: fatal errors (synchronous, on the calling thread,
//! so the crash record reaches the writer before process teardown) and the
//! drain-for-shutdown path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beacon_domain::{
    ActionType, Attributes, BeaconError, ErrorSource, RecordKind, ResourceKey, ResourceKind,
    ResourceTiming, Result, RumConfig, RumRawEvent,
};
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::attributes::GlobalAttributes;
use crate::ports::{EventSink, FirstPartyHostDetector, RecordWriter};
use crate::scopes::application::ApplicationScope;

/// Counters kept by the facade from delivery-outcome notifications.
#[derive(Default)]
struct MonitorStats {
    records_sent: Mutex<HashMap<RecordKind, u64>>,
    records_dropped: Mutex<HashMap<RecordKind, u64>>,
    dropped_actions: AtomicU64,
}

/// Point-in-time copy of the facade's bookkeeping counters.
#[derive(Debug, Clone, Default)]
pub struct MonitorStatsSnapshot {
    pub records_sent: HashMap<RecordKind, u64>,
    pub records_dropped: HashMap<RecordKind, u64>,
    pub dropped_actions: u64,
}

/// Scope tree plus everything an applied event can touch.
struct DispatchState {
    root: ApplicationScope,
    writer: Arc<dyn RecordWriter>,
}

/// Cloneable submission handle; implements [`EventSink`] for the delivery
/// side to feed record-sent/record-dropped notifications back in.
#[derive(Clone)]
pub struct MonitorHandle {
    tx: UnboundedSender<RumRawEvent>,
    accepting: Arc<AtomicBool>,
}

impl EventSink for MonitorHandle {
    fn submit(&self, event: RumRawEvent) {
        if self.accepting.load(Ordering::Acquire) {
            // Send failure means the worker is gone; the event is dropped
            // like any other post-shutdown submission.
            let _ = self.tx.send(event);
        }
    }
}

/// Public entry point; serializes raw events onto one logical worker.
pub struct RumMonitor {
    tx: UnboundedSender<RumRawEvent>,
    rx: Option<UnboundedReceiver<RumRawEvent>>,
    state: Arc<Mutex<DispatchState>>,
    stats: Arc<MonitorStats>,
    globals: Arc<GlobalAttributes>,
    accepting: Arc<AtomicBool>,
    keep_alive_interval: Duration,
    join_timeout: Duration,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl RumMonitor {
    /// Create a monitor for the given application configuration.
    pub fn new(
        config: RumConfig,
        writer: Arc<dyn RecordWriter>,
        detector: Arc<dyn FirstPartyHostDetector>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let globals = Arc::new(GlobalAttributes::new());
        let keep_alive_interval = config.keep_alive_interval;
        let root =
            ApplicationScope::new(Arc::new(config), Arc::clone(&globals), detector);
        Self {
            tx,
            rx: Some(rx),
            state: Arc::new(Mutex::new(DispatchState { root, writer })),
            stats: Arc::new(MonitorStats::default()),
            globals,
            accepting: Arc::new(AtomicBool::new(true)),
            keep_alive_interval,
            join_timeout: Duration::from_secs(5),
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start the dispatch worker. The monitor is one-shot: once stopped
    /// it cannot be started again.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<()> {
        let Some(rx) = self.rx.take() else {
            return Err(BeaconError::InvalidInput(
                "monitor already started; restart is not supported".into(),
            ));
        };

        info!("Starting RUM dispatch worker");
        self.cancellation = CancellationToken::new();

        let state = Arc::clone(&self.state);
        let stats = Arc::clone(&self.stats);
        let keep_alive = self.keep_alive_interval;
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::dispatch_loop(rx, state, stats, keep_alive, cancel).await;
        });
        self.task_handle = Some(handle);

        info!("RUM dispatch worker started");
        Ok(())
    }

    /// Drain-for-shutdown: stop accepting submissions, run all queued work to
    /// completion, then tear the worker down.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(BeaconError::InvalidInput("monitor not running".into()));
        };

        info!("Stopping RUM dispatch worker");
        self.accepting.store(false, Ordering::Release);
        self.cancellation.cancel();

        match tokio::time::timeout(self.join_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Dispatch worker panicked: {}", e);
                return Err(BeaconError::Internal("dispatch worker panicked".into()));
            }
            Err(_) => {
                warn!("Dispatch worker did not complete within timeout");
                return Err(BeaconError::Internal("dispatch worker join timeout".into()));
            }
        }

        info!("RUM dispatch worker stopped");
        Ok(())
    }

    /// True while the dispatch worker is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Cloneable submission handle for the delivery side.
    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle { tx: self.tx.clone(), accepting: Arc::clone(&self.accepting) }
    }

    /// Shared global attribute store.
    pub fn global_attributes(&self) -> Arc<GlobalAttributes> {
        Arc::clone(&self.globals)
    }

    /// Copy of the sent/dropped bookkeeping counters.
    pub fn stats(&self) -> MonitorStatsSnapshot {
        MonitorStatsSnapshot {
            records_sent: self.stats.records_sent.lock().clone(),
            records_dropped: self.stats.records_dropped.lock().clone(),
            dropped_actions: self.stats.dropped_actions.load(Ordering::Relaxed),
        }
    }

    // ------------------------------------------------------------------
    // Public operations; each constructs a raw event stamped with the
    // current timestamp and submits it for serialized processing.
    // ------------------------------------------------------------------

    pub fn start_view(&self, key: impl Into<String>, name: impl Into<String>, attributes: Attributes) {
        self.submit_event(RumRawEvent::StartView {
            key: key.into(),
            name: name.into(),
            attributes,
            time: Utc::now(),
        });
    }

    pub fn stop_view(&self, key: impl Into<String>, attributes: Attributes) {
        self.submit_event(RumRawEvent::StopView { key: key.into(), attributes, time: Utc::now() });
    }

    pub fn start_action(
        &self,
        action_type: ActionType,
        name: impl Into<String>,
        continuous: bool,
        attributes: Attributes,
    ) {
        self.submit_event(RumRawEvent::StartAction {
            action_type,
            name: name.into(),
            continuous,
            attributes,
            time: Utc::now(),
        });
    }

    pub fn stop_action(
        &self,
        action_type: Option<ActionType>,
        name: Option<String>,
        attributes: Attributes,
    ) {
        self.submit_event(RumRawEvent::StopAction {
            action_type,
            name,
            attributes,
            time: Utc::now(),
        });
    }

    pub fn send_action_now(&self) {
        self.submit_event(RumRawEvent::SendActionNow { time: Utc::now() });
    }

    /// Begin tracking a network call; the returned key matches it later.
    pub fn start_resource(
        &self,
        url: impl Into<String>,
        method: impl Into<String>,
        attributes: Attributes,
    ) -> ResourceKey {
        let key = ResourceKey::next();
        self.submit_event(RumRawEvent::StartResource {
            key,
            url: url.into(),
            method: method.into(),
            attributes,
            time: Utc::now(),
        });
        key
    }

    pub fn stop_resource(
        &self,
        key: ResourceKey,
        status_code: Option<u32>,
        size: Option<u64>,
        kind: ResourceKind,
        attributes: Attributes,
    ) {
        self.submit_event(RumRawEvent::StopResource {
            key,
            status_code,
            size,
            kind,
            attributes,
            time: Utc::now(),
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn stop_resource_with_error(
        &self,
        key: ResourceKey,
        status_code: Option<u32>,
        message: impl Into<String>,
        source: ErrorSource,
        error_type: Option<String>,
        attributes: Attributes,
    ) {
        self.submit_event(RumRawEvent::StopResourceWithError {
            key,
            status_code,
            message: message.into(),
            source,
            error_type,
            attributes,
            time: Utc::now(),
        });
    }

    /// Report an error. A fatal error bypasses the queue entirely and is
    /// applied synchronously on the calling thread, under the tree lock, so
    /// the crash record reaches the writer before process termination.
    #[allow(clippy::too_many_arguments)]
    pub fn add_error(
        &self,
        message: impl Into<String>,
        source: ErrorSource,
        error_type: Option<String>,
        stacktrace: Option<String>,
        is_fatal: bool,
        attributes: Attributes,
    ) {
        let event = RumRawEvent::AddError {
            message: message.into(),
            source,
            error_type,
            stacktrace,
            is_fatal,
            attributes,
            time: Utc::now(),
        };
        if is_fatal {
            Self::apply(&self.state, &self.stats, event);
        } else {
            self.submit_event(event);
        }
    }

    pub fn add_long_task(&self, duration_ns: i64, attributes: Attributes) {
        self.submit_event(RumRawEvent::AddLongTask { duration_ns, attributes, time: Utc::now() });
    }

    pub fn add_resource_timing(&self, key: ResourceKey, timing: ResourceTiming) {
        self.submit_event(RumRawEvent::AddResourceTiming { key, timing, time: Utc::now() });
    }

    pub fn wait_for_resource_timing(&self, key: ResourceKey) {
        self.submit_event(RumRawEvent::WaitForResourceTiming { key, time: Utc::now() });
    }

    pub fn view_tree_changed(&self) {
        self.submit_event(RumRawEvent::ViewTreeChanged { time: Utc::now() });
    }

    pub fn reset_session(&self) {
        self.submit_event(RumRawEvent::ResetSession { time: Utc::now() });
    }

    pub fn add_attribute(&self, key: impl Into<String>, value: serde_json::Value) {
        self.globals.add(key, value);
    }

    pub fn remove_attribute(&self, key: &str) {
        self.globals.remove(key);
    }

    /// Submit a pre-built event, e.g. one carrying an explicit timestamp.
    pub fn submit_event(&self, event: RumRawEvent) {
        if self.accepting.load(Ordering::Acquire) {
            let _ = self.tx.send(event);
        }
    }

    // ------------------------------------------------------------------
    // Dispatch internals
    // ------------------------------------------------------------------

    async fn dispatch_loop(
        mut rx: UnboundedReceiver<RumRawEvent>,
        state: Arc<Mutex<DispatchState>>,
        stats: Arc<MonitorStats>,
        keep_alive: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            // The keep-alive sleep is recreated every iteration, which
            // reschedules the heartbeat after each processed event.
            tokio::select! {
                _ = cancel.cancelled() => {
                    let mut drained = 0_usize;
                    while let Ok(event) = rx.try_recv() {
                        Self::apply(&state, &stats, event);
                        drained += 1;
                    }
                    debug!(drained, "dispatch loop cancelled");
                    break;
                }
                maybe = rx.recv() => {
                    match maybe {
                        Some(event) => Self::apply(&state, &stats, event),
                        None => break,
                    }
                }
                _ = tokio::time::sleep(keep_alive) => {
                    Self::apply(&state, &stats, RumRawEvent::KeepAlive { time: Utc::now() });
                }
            }
        }
    }

    /// Apply one event to the scope tree under the lock.
    fn apply(state: &Arc<Mutex<DispatchState>>, stats: &Arc<MonitorStats>, event: RumRawEvent) {
        match &event {
            RumRawEvent::RecordSent { kind, .. } => {
                *stats.records_sent.lock().entry(*kind).or_default() += 1;
            }
            RumRawEvent::RecordDropped { kind, .. } => {
                *stats.records_dropped.lock().entry(*kind).or_default() += 1;
            }
            _ => {}
        }

        let mut guard = state.lock();
        let DispatchState { root, writer } = &mut *guard;
        let result = root.handle_event(&event, writer.as_ref());
        if result.dropped_actions > 0 {
            stats
                .dropped_actions
                .fetch_add(u64::from(result.dropped_actions), Ordering::Relaxed);
        }
    }
}

impl Drop for RumMonitor {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("RumMonitor dropped while running; cancelling dispatch worker");
            self.cancellation.cancel();
        }
    }
}
