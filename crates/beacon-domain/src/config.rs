//! Configuration structures for aggregation and delivery.
//!
//! The numeric defaults below are deployment-tunable; embedders override them
//! through the public fields rather than a builder.

use std::time::Duration;

/// Configuration for the event-aggregation side (monitor + scope hierarchy).
#[derive(Debug, Clone)]
pub struct RumConfig {
    /// Application identifier stamped into every record
    pub application_id: String,
    /// Session sampling rate in percent (0.0 rejects everything, 100.0 keeps everything)
    pub sample_rate: f32,
    /// Session renews after this much time without any event
    pub session_inactivity_timeout: Duration,
    /// Hard cap on a single session's lifetime
    pub session_max_duration: Duration,
    /// A user action closes after this much time without qualifying activity
    pub action_inactivity_threshold: Duration,
    /// Hard cap on a single action's duration
    pub action_max_duration: Duration,
    /// Interval between synthetic keep-alive events driving lazy time-based closes
    pub keep_alive_interval: Duration,
}

impl RumConfig {
    /// Create a configuration with default thresholds for the given application.
    pub fn new(application_id: impl Into<String>) -> Self {
        Self { application_id: application_id.into(), ..Self::default() }
    }
}

impl Default for RumConfig {
    fn default() -> Self {
        Self {
            application_id: String::new(),
            sample_rate: 100.0,
            session_inactivity_timeout: Duration::from_secs(15 * 60),
            session_max_duration: Duration::from_secs(4 * 60 * 60),
            action_inactivity_threshold: Duration::from_millis(100),
            action_max_duration: Duration::from_secs(10),
            keep_alive_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Configuration for one upload worker.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Base step for the adaptive interval; the worker runs between
    /// 1x and 10x this value, starting at 5x
    pub base_interval: Duration,
    /// Battery level (0.0..=1.0) below which uploads pause unless
    /// the device is charging or full
    pub low_battery_threshold: f32,
    /// Join timeout when stopping the worker
    pub join_timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(5),
            low_battery_threshold: 0.10,
            join_timeout: Duration::from_secs(5),
        }
    }
}
