//! Best-effort synchronous flush of all pending batches.
//!
//! Used on application exit, when there is no opportunity to wait for the
//! periodic workers. Every batch gets exactly one upload attempt and is
//! removed afterward regardless of the outcome.

use std::sync::Arc;

use beacon_core::{BatchStore, UploadClient};
use beacon_domain::{Category, UploadStatus};
use tracing::{debug, instrument, warn};

/// One-shot uploader for everything a store currently holds.
pub struct Flusher {
    category: Category,
    store: Arc<dyn BatchStore>,
    client: Arc<dyn UploadClient>,
}

impl Flusher {
    pub fn new(category: Category, store: Arc<dyn BatchStore>, client: Arc<dyn UploadClient>) -> Self {
        Self { category, store, client }
    }

    /// Upload every pending batch once, dropping each afterward.
    #[instrument(skip(self), fields(category = %self.category))]
    pub async fn flush_all(&self) {
        let batches = match self.store.list_flushable().await {
            Ok(batches) => batches,
            Err(err) => {
                warn!(category = %self.category, error = %err, "failed to list flushable batches");
                return;
            }
        };

        debug!(category = %self.category, count = batches.len(), "flushing pending batches");

        for batch in batches {
            let status = self.client.upload(&batch.data).await;
            if status != UploadStatus::Success {
                warn!(category = %self.category, batch = %batch.id, ?status, "flush upload failed");
            }
            if let Err(err) = self.store.drop_batch(batch).await {
                warn!(category = %self.category, error = %err, "failed to drop flushed batch");
            }
        }
    }
}
