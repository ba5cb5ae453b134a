//! Delivery-side types: batches, upload outcomes, device state

use serde::{Deserialize, Serialize};

/// Telemetry category; each owns an independent upload loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Logs,
    Traces,
    Rum,
    CrashReports,
}

impl Category {
    /// Stable name used in logs and storage partitioning.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Logs => "logs",
            Self::Traces => "traces",
            Self::Rum => "rum",
            Self::CrashReports => "crash_reports",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A durable, lockable unit of one-or-more serialized records awaiting upload.
///
/// The batch is locked while being uploaded so a second reader cannot obtain
/// it concurrently; `release` unlocks it for a later cycle, `drop` removes it
/// permanently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Storage handle
    pub id: String,
    /// Already-serialized payload
    pub data: Vec<u8>,
    /// Number of records inside, for bookkeeping only
    pub record_count: usize,
}

/// Outcome of one upload attempt as classified by the network client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Success,
    HttpRedirect,
    HttpClientError,
    HttpServerError,
    InvalidToken,
    RateLimited,
    NetworkError,
    UnknownError,
}

impl UploadStatus {
    /// Whether the batch should be retained and retried on a later cycle.
    ///
    /// Only transient failures are retryable; client/auth errors would fail
    /// identically on every retry, so their batches are dropped.
    pub fn should_retry(self) -> bool {
        matches!(self, Self::NetworkError | Self::HttpServerError | Self::RateLimited)
    }
}

/// Kind of network currently available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    Wifi,
    Cellular,
    Ethernet,
    Other,
}

/// Latest known connectivity, as reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityStatus {
    NotConnected,
    Connected(NetworkKind),
}

/// Latest known power state, as reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerState {
    /// Battery level in 0.0..=1.0
    pub battery_level: f32,
    pub charging_or_full: bool,
    pub power_save_mode: bool,
}

impl PowerState {
    /// A state that never gates uploads; useful as a default provider.
    pub fn unconstrained() -> Self {
        Self { battery_level: 1.0, charging_or_full: true, power_save_mode: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(UploadStatus::NetworkError.should_retry());
        assert!(UploadStatus::HttpServerError.should_retry());
        assert!(UploadStatus::RateLimited.should_retry());

        assert!(!UploadStatus::Success.should_retry());
        assert!(!UploadStatus::HttpRedirect.should_retry());
        assert!(!UploadStatus::HttpClientError.should_retry());
        assert!(!UploadStatus::InvalidToken.should_retry());
        assert!(!UploadStatus::UnknownError.should_retry());
    }
}
