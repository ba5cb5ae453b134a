//! Worker error types

use beacon_domain::BeaconError;
use thiserror::Error;

/// Upload-worker lifecycle errors
#[derive(Debug, Error)]
pub enum UploadWorkerError {
    /// Worker is already running
    #[error("Upload worker already running")]
    AlreadyRunning,

    /// Worker is not running
    #[error("Upload worker not running")]
    NotRunning,

    /// Worker did not stop within the join timeout
    #[error("Upload worker did not stop within {seconds}s")]
    JoinTimeout { seconds: u64 },

    /// Worker task panicked
    #[error("Upload worker task failed: {0}")]
    TaskJoinFailed(String),
}

impl From<UploadWorkerError> for BeaconError {
    fn from(err: UploadWorkerError) -> Self {
        match err {
            UploadWorkerError::AlreadyRunning | UploadWorkerError::NotRunning => {
                Self::InvalidInput(err.to_string())
            }
            UploadWorkerError::JoinTimeout { .. } | UploadWorkerError::TaskJoinFailed(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

/// Convenience type alias for worker lifecycle operations
pub type WorkerResult<T> = Result<T, UploadWorkerError>;
