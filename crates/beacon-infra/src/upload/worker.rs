//! Per-category upload worker.
//!
//! Each telemetry category runs one independent loop over its own batch
//! store reader and network client. A cycle either makes progress (a batch
//! delivered and removed) or not (no batch, device constraints, retryable
//! failure); the adaptive interval reacts accordingly. Sleeping inside the
//! single loop task is what reschedules the worker, so there is never more
//! than one pending schedule per loop.

use std::sync::Arc;

use beacon_core::{BatchStore, ConnectivityProvider, PowerStateProvider, UploadClient};
use beacon_domain::{Category, ConnectivityStatus, UploadConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::backoff::AdaptiveInterval;
use crate::errors::{UploadWorkerError, WorkerResult};

/// Outcome of one upload cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    Progress,
    NoProgress,
}

/// Collaborators of the upload loop, bundled to keep signatures small.
struct UploadLoopContext {
    store: Arc<dyn BatchStore>,
    client: Arc<dyn UploadClient>,
    connectivity: Arc<dyn ConnectivityProvider>,
    power: Arc<dyn PowerStateProvider>,
}

/// Upload worker with explicit lifecycle management.
pub struct UploadWorker {
    category: Category,
    store: Arc<dyn BatchStore>,
    client: Arc<dyn UploadClient>,
    connectivity: Arc<dyn ConnectivityProvider>,
    power: Arc<dyn PowerStateProvider>,
    config: UploadConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl UploadWorker {
    /// Create a new worker for the given category.
    pub fn new(
        category: Category,
        store: Arc<dyn BatchStore>,
        client: Arc<dyn UploadClient>,
        connectivity: Arc<dyn ConnectivityProvider>,
        power: Arc<dyn PowerStateProvider>,
        config: UploadConfig,
    ) -> Self {
        Self {
            category,
            store,
            client,
            connectivity,
            power,
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start the worker, spawning the background upload loop.
    #[instrument(skip(self), fields(category = %self.category))]
    pub fn start(&mut self) -> WorkerResult<()> {
        if self.is_running() {
            return Err(UploadWorkerError::AlreadyRunning);
        }

        info!(category = %self.category, "Starting upload worker");

        // Create fresh cancellation token (supports restart after stop)
        self.cancellation = CancellationToken::new();

        let context = UploadLoopContext {
            store: Arc::clone(&self.store),
            client: Arc::clone(&self.client),
            connectivity: Arc::clone(&self.connectivity),
            power: Arc::clone(&self.power),
        };
        let config = self.config.clone();
        let category = self.category;
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::upload_loop(context, config, category, cancel).await;
        });
        self.task_handle = Some(handle);

        info!(category = %self.category, "Upload worker started");
        Ok(())
    }

    /// Stop the worker and wait for the upload loop to finish.
    #[instrument(skip(self), fields(category = %self.category))]
    pub async fn stop(&mut self) -> WorkerResult<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(UploadWorkerError::NotRunning);
        };

        info!(category = %self.category, "Stopping upload worker");
        self.cancellation.cancel();

        let join_timeout = self.config.join_timeout;
        match tokio::time::timeout(join_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(UploadWorkerError::TaskJoinFailed(e.to_string())),
            Err(_) => {
                return Err(UploadWorkerError::JoinTimeout { seconds: join_timeout.as_secs() })
            }
        }

        info!(category = %self.category, "Upload worker stopped");
        Ok(())
    }

    /// Returns true when a worker loop is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Background upload loop.
    async fn upload_loop(
        context: UploadLoopContext,
        config: UploadConfig,
        category: Category,
        cancel: CancellationToken,
    ) {
        let mut interval = AdaptiveInterval::new(config.base_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%category, "upload loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval.current()) => {
                    match Self::run_cycle(&context, &config, category).await {
                        CycleOutcome::Progress => interval.record_progress(),
                        CycleOutcome::NoProgress => interval.record_no_progress(),
                    }
                }
            }
        }
    }

    /// One upload cycle: gate on device state, then lock, upload, resolve.
    async fn run_cycle(
        context: &UploadLoopContext,
        config: &UploadConfig,
        category: Category,
    ) -> CycleOutcome {
        if context.connectivity.latest_connectivity() == ConnectivityStatus::NotConnected {
            debug!(%category, "not connected; skipping upload cycle");
            return CycleOutcome::NoProgress;
        }

        let power = context.power.latest_power_state();
        let low_battery =
            power.battery_level < config.low_battery_threshold && !power.charging_or_full;
        if low_battery || power.power_save_mode {
            debug!(
                %category,
                battery = power.battery_level,
                power_save = power.power_save_mode,
                "unfavorable power state; skipping upload cycle"
            );
            return CycleOutcome::NoProgress;
        }

        let batch = match context.store.lock_next().await {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                debug!(%category, "no batch ready for upload");
                return CycleOutcome::NoProgress;
            }
            Err(err) => {
                warn!(%category, error = %err, "failed to lock next batch");
                return CycleOutcome::NoProgress;
            }
        };

        let status = context.client.upload(&batch.data).await;
        debug!(%category, batch = %batch.id, ?status, "batch upload attempted");

        if status.should_retry() {
            if let Err(err) = context.store.release(batch).await {
                warn!(%category, error = %err, "failed to release batch");
            }
            CycleOutcome::NoProgress
        } else {
            if status != beacon_domain::UploadStatus::Success {
                warn!(%category, ?status, "terminal upload failure; dropping batch");
            }
            if let Err(err) = context.store.drop_batch(batch).await {
                warn!(%category, error = %err, "failed to drop batch");
            }
            CycleOutcome::Progress
        }
    }
}

impl Drop for UploadWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(category = %self.category, "UploadWorker dropped while running; cancelling");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use beacon_domain::{Batch, NetworkKind, PowerState, Result as DomainResult, UploadStatus};
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct MockStore {
        batches: Mutex<Vec<Batch>>,
        released: Mutex<Vec<String>>,
        dropped: Mutex<Vec<String>>,
    }

    impl MockStore {
        fn with_batch(data: &[u8]) -> Self {
            let store = Self::default();
            store.batches.lock().push(Batch {
                id: "batch-1".to_string(),
                data: data.to_vec(),
                record_count: 1,
            });
            store
        }
    }

    #[async_trait]
    impl BatchStore for MockStore {
        async fn write(&self, _data: Vec<u8>) -> DomainResult<()> {
            Ok(())
        }

        async fn lock_next(&self) -> DomainResult<Option<Batch>> {
            Ok(self.batches.lock().pop())
        }

        async fn release(&self, batch: Batch) -> DomainResult<()> {
            self.released.lock().push(batch.id.clone());
            self.batches.lock().push(batch);
            Ok(())
        }

        async fn drop_batch(&self, batch: Batch) -> DomainResult<()> {
            self.dropped.lock().push(batch.id);
            Ok(())
        }

        async fn list_flushable(&self) -> DomainResult<Vec<Batch>> {
            Ok(self.batches.lock().clone())
        }
    }

    struct MockClient {
        status: UploadStatus,
        calls: Mutex<usize>,
    }

    impl MockClient {
        fn new(status: UploadStatus) -> Self {
            Self { status, calls: Mutex::new(0) }
        }
    }

    #[async_trait]
    impl UploadClient for MockClient {
        async fn upload(&self, _data: &[u8]) -> UploadStatus {
            *self.calls.lock() += 1;
            self.status
        }
    }

    struct StaticConnectivity(ConnectivityStatus);

    impl ConnectivityProvider for StaticConnectivity {
        fn latest_connectivity(&self) -> ConnectivityStatus {
            self.0
        }
    }

    struct StaticPower(PowerState);

    impl PowerStateProvider for StaticPower {
        fn latest_power_state(&self) -> PowerState {
            self.0
        }
    }

    fn context(store: Arc<MockStore>, client: Arc<MockClient>) -> UploadLoopContext {
        UploadLoopContext {
            store,
            client,
            connectivity: Arc::new(StaticConnectivity(ConnectivityStatus::Connected(
                NetworkKind::Wifi,
            ))),
            power: Arc::new(StaticPower(PowerState::unconstrained())),
        }
    }

    #[tokio::test]
    async fn successful_upload_drops_batch_and_makes_progress() {
        let store = Arc::new(MockStore::with_batch(b"payload"));
        let client = Arc::new(MockClient::new(UploadStatus::Success));
        let ctx = context(Arc::clone(&store), Arc::clone(&client));

        let outcome = UploadWorker::run_cycle(&ctx, &UploadConfig::default(), Category::Rum).await;

        assert_eq!(outcome, CycleOutcome::Progress);
        assert_eq!(store.dropped.lock().as_slice(), ["batch-1".to_string()]);
        assert!(store.released.lock().is_empty());
    }

    #[tokio::test]
    async fn retryable_failure_releases_batch() {
        let store = Arc::new(MockStore::with_batch(b"payload"));
        let client = Arc::new(MockClient::new(UploadStatus::HttpServerError));
        let ctx = context(Arc::clone(&store), Arc::clone(&client));

        let outcome = UploadWorker::run_cycle(&ctx, &UploadConfig::default(), Category::Rum).await;

        assert_eq!(outcome, CycleOutcome::NoProgress);
        assert_eq!(store.released.lock().as_slice(), ["batch-1".to_string()]);
        assert!(store.dropped.lock().is_empty());
    }

    #[tokio::test]
    async fn terminal_client_error_drops_batch() {
        let store = Arc::new(MockStore::with_batch(b"payload"));
        let client = Arc::new(MockClient::new(UploadStatus::InvalidToken));
        let ctx = context(Arc::clone(&store), Arc::clone(&client));

        let outcome = UploadWorker::run_cycle(&ctx, &UploadConfig::default(), Category::Rum).await;

        assert_eq!(outcome, CycleOutcome::Progress);
        assert_eq!(store.dropped.lock().as_slice(), ["batch-1".to_string()]);
    }

    #[tokio::test]
    async fn disconnected_device_skips_reading() {
        let store = Arc::new(MockStore::with_batch(b"payload"));
        let client = Arc::new(MockClient::new(UploadStatus::Success));
        let ctx = UploadLoopContext {
            store: Arc::clone(&store) as Arc<dyn BatchStore>,
            client: Arc::clone(&client) as Arc<dyn UploadClient>,
            connectivity: Arc::new(StaticConnectivity(ConnectivityStatus::NotConnected)),
            power: Arc::new(StaticPower(PowerState::unconstrained())),
        };

        let outcome = UploadWorker::run_cycle(&ctx, &UploadConfig::default(), Category::Rum).await;

        assert_eq!(outcome, CycleOutcome::NoProgress);
        assert_eq!(*client.calls.lock(), 0);
        assert_eq!(store.batches.lock().len(), 1);
    }

    #[tokio::test]
    async fn low_battery_without_charging_skips_reading() {
        let store = Arc::new(MockStore::with_batch(b"payload"));
        let client = Arc::new(MockClient::new(UploadStatus::Success));
        let ctx = UploadLoopContext {
            store: Arc::clone(&store) as Arc<dyn BatchStore>,
            client: Arc::clone(&client) as Arc<dyn UploadClient>,
            connectivity: Arc::new(StaticConnectivity(ConnectivityStatus::Connected(
                NetworkKind::Cellular,
            ))),
            power: Arc::new(StaticPower(PowerState {
                battery_level: 0.05,
                charging_or_full: false,
                power_save_mode: false,
            })),
        };

        let outcome = UploadWorker::run_cycle(&ctx, &UploadConfig::default(), Category::Rum).await;

        assert_eq!(outcome, CycleOutcome::NoProgress);
        assert_eq!(*client.calls.lock(), 0);
    }

    #[tokio::test]
    async fn charging_device_uploads_even_on_low_battery() {
        let store = Arc::new(MockStore::with_batch(b"payload"));
        let client = Arc::new(MockClient::new(UploadStatus::Success));
        let ctx = UploadLoopContext {
            store: Arc::clone(&store) as Arc<dyn BatchStore>,
            client: Arc::clone(&client) as Arc<dyn UploadClient>,
            connectivity: Arc::new(StaticConnectivity(ConnectivityStatus::Connected(
                NetworkKind::Wifi,
            ))),
            power: Arc::new(StaticPower(PowerState {
                battery_level: 0.05,
                charging_or_full: true,
                power_save_mode: false,
            })),
        };

        let outcome = UploadWorker::run_cycle(&ctx, &UploadConfig::default(), Category::Rum).await;

        assert_eq!(outcome, CycleOutcome::Progress);
        assert_eq!(*client.calls.lock(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn worker_lifecycle() {
        let store = Arc::new(MockStore::default());
        let client = Arc::new(MockClient::new(UploadStatus::Success));
        let mut worker = UploadWorker::new(
            Category::Rum,
            store,
            client,
            Arc::new(StaticConnectivity(ConnectivityStatus::Connected(NetworkKind::Wifi))),
            Arc::new(StaticPower(PowerState::unconstrained())),
            UploadConfig::default(),
        );

        assert!(!worker.is_running());
        worker.start().unwrap();
        assert!(worker.is_running());
        assert!(matches!(worker.start(), Err(UploadWorkerError::AlreadyRunning)));

        worker.stop().await.unwrap();
        assert!(!worker.is_running());
        assert!(matches!(worker.stop().await, Err(UploadWorkerError::NotRunning)));
    }
}
