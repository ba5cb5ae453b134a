//! Storage adapters: the record writer feeding the batch store, and an
//! in-memory batch store implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use beacon_core::{BatchStore, EventSink, RecordWriter};
use beacon_domain::{Batch, BeaconError, Result, RumRawEvent, RumRecord};
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};
use uuid::Uuid;

/// Record writer backed by a [`BatchStore`].
///
/// `write` is called from scope logic and must not block: the record is
/// handed to a storage task over a channel. The task serializes it, appends
/// it to the store, and feeds a `RecordSent`/`RecordDropped` notification
/// back through the event sink so the facade's counters stay truthful.
/// Failed writes are logged and lost; they are never retried.
pub struct StorageRecordWriter {
    tx: UnboundedSender<RumRecord>,
    rx: Option<UnboundedReceiver<RumRecord>>,
    store: Arc<dyn BatchStore>,
    sink: Arc<Mutex<Option<Arc<dyn EventSink>>>>,
}

impl StorageRecordWriter {
    /// Create the writer. No task is spawned until [`start`](Self::start),
    /// so construction is safe outside a runtime; records written before the
    /// task starts queue up on the channel.
    pub fn new(store: Arc<dyn BatchStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<RumRecord>();
        Self { tx, rx: Some(rx), store, sink: Arc::new(Mutex::new(None)) }
    }

    /// Spawn the storage task. Must be called from a runtime context.
    pub fn start(&mut self) -> Result<()> {
        let Some(mut rx) = self.rx.take() else {
            return Err(BeaconError::InvalidInput("storage writer already started".into()));
        };
        let store = Arc::clone(&self.store);
        let sink_for_task = Arc::clone(&self.sink);

        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let kind = record.kind();
                let view_id = record.view_id().to_string();

                let outcome = match serde_json::to_vec(&record) {
                    Ok(bytes) => store.write(bytes).await,
                    Err(err) => Err(BeaconError::Internal(format!(
                        "record serialization failed: {err}"
                    ))),
                };

                let notification = match outcome {
                    Ok(()) => RumRawEvent::RecordSent { view_id, kind, time: Utc::now() },
                    Err(err) => {
                        warn!(error = %err, ?kind, "record write failed; record lost");
                        RumRawEvent::RecordDropped { view_id, kind, time: Utc::now() }
                    }
                };

                let sink = sink_for_task.lock().clone();
                if let Some(sink) = sink {
                    sink.submit(notification);
                }
            }
            debug!("storage task finished");
        });

        Ok(())
    }

    /// Connect the facade's event sink for delivery-outcome notifications.
    ///
    /// Set after construction because the monitor itself is built with this
    /// writer; notifications produced before the sink is connected are
    /// silently skipped.
    pub fn set_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.lock() = Some(sink);
    }
}

impl RecordWriter for StorageRecordWriter {
    fn write(&self, record: RumRecord) {
        // Send failure means the runtime is shutting down; the record is
        // lost, same as any other persistence failure.
        if self.tx.send(record).is_err() {
            warn!("storage task gone; record lost");
        }
    }
}

/// How the in-memory store rolls records over into batches.
#[derive(Debug, Clone)]
pub struct InMemoryBatchStoreConfig {
    /// Seal the current batch once it holds this many bytes
    pub max_batch_bytes: usize,
    /// Seal the current batch once it holds this many records
    pub max_batch_records: usize,
}

impl Default for InMemoryBatchStoreConfig {
    fn default() -> Self {
        Self { max_batch_bytes: 512 * 1024, max_batch_records: 500 }
    }
}

#[derive(Default)]
struct StoreState {
    current: Vec<Vec<u8>>,
    current_bytes: usize,
    ready: VecDeque<Batch>,
    locked: HashMap<String, Batch>,
}

/// Size-bounded batch store kept entirely in memory.
///
/// A locked batch is moved out of the ready queue, so a second reader can
/// never obtain it until it is released.
pub struct InMemoryBatchStore {
    config: InMemoryBatchStoreConfig,
    state: Mutex<StoreState>,
}

impl InMemoryBatchStore {
    pub fn new(config: InMemoryBatchStoreConfig) -> Self {
        Self { config, state: Mutex::new(StoreState::default()) }
    }

    fn seal_current(state: &mut StoreState) {
        if state.current.is_empty() {
            return;
        }
        let record_count = state.current.len();
        let data = state.current.join(&b'\n');
        state.current.clear();
        state.current_bytes = 0;
        state.ready.push_back(Batch { id: Uuid::new_v4().to_string(), data, record_count });
    }
}

impl Default for InMemoryBatchStore {
    fn default() -> Self {
        Self::new(InMemoryBatchStoreConfig::default())
    }
}

#[async_trait::async_trait]
impl BatchStore for InMemoryBatchStore {
    async fn write(&self, data: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock();
        state.current_bytes += data.len();
        state.current.push(data);
        if state.current_bytes >= self.config.max_batch_bytes
            || state.current.len() >= self.config.max_batch_records
        {
            Self::seal_current(&mut state);
        }
        Ok(())
    }

    async fn lock_next(&self) -> Result<Option<Batch>> {
        let mut state = self.state.lock();
        if state.ready.is_empty() {
            Self::seal_current(&mut state);
        }
        let Some(batch) = state.ready.pop_front() else {
            return Ok(None);
        };
        state.locked.insert(batch.id.clone(), batch.clone());
        Ok(Some(batch))
    }

    async fn release(&self, batch: Batch) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(batch) = state.locked.remove(&batch.id) {
            state.ready.push_back(batch);
        }
        Ok(())
    }

    async fn drop_batch(&self, batch: Batch) -> Result<()> {
        let mut state = self.state.lock();
        if state.locked.remove(&batch.id).is_none() {
            state.ready.retain(|b| b.id != batch.id);
        }
        Ok(())
    }

    async fn list_flushable(&self) -> Result<Vec<Batch>> {
        let mut state = self.state.lock();
        Self::seal_current(&mut state);
        Ok(state.ready.iter().cloned().collect())
    }
}
