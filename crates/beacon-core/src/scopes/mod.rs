//! The scope hierarchy: stateful nodes consuming raw events and emitting
//! finished records.
//!
//! Parent/child links go one way only: a parent owns its children and learns
//! about their fate from the result value of `handle_event`, never through a
//! stored back-reference. A scope that has terminated reports
//! [`ScopeState::Closed`] and the parent drops it.

pub mod action;
pub mod application;
pub mod resource;
pub mod session;
pub mod view;

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Liveness of a scope after handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Scope stays alive; keep the reference
    Open,
    /// Scope has terminated; parent must drop its reference
    Closed,
}

/// Whether at least `threshold` has elapsed between `since` and `now`.
///
/// Clock skew making `now` earlier than `since` counts as "not elapsed".
pub(crate) fn exceeds(since: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    now.signed_duration_since(since).to_std().map(|d| d >= threshold).unwrap_or(false)
}

/// Elapsed nanoseconds between two instants, clamped to zero on skew.
pub(crate) fn elapsed_ns(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    to.signed_duration_since(from).num_nanoseconds().unwrap_or(i64::MAX).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exceeds_handles_clock_skew() {
        let now = Utc::now();
        let later = now + chrono::Duration::seconds(10);

        assert!(exceeds(now, later, Duration::from_secs(5)));
        assert!(!exceeds(now, later, Duration::from_secs(30)));
        // now earlier than since: never elapsed
        assert!(!exceeds(later, now, Duration::from_secs(1)));
    }

    #[test]
    fn elapsed_ns_clamps_negative() {
        let now = Utc::now();
        let later = now + chrono::Duration::milliseconds(2);

        assert_eq!(elapsed_ns(later, now), 0);
        assert_eq!(elapsed_ns(now, later), 2_000_000);
    }
}
