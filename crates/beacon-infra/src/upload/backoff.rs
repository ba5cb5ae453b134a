//! Adaptive polling interval for upload loops.
//!
//! The interval is derived from a configured base step: it starts at 5x base,
//! never drops below 1x and never rises above 10x. Progress (a batch uploaded
//! and removed) shrinks it by 10%; no progress (nothing to do, device
//! constraints, or a retryable failure) grows it by 10%.

use std::time::Duration;

const DEFAULT_FACTOR: u32 = 5;
const MIN_FACTOR: u32 = 1;
const MAX_FACTOR: u32 = 10;
const GROWTH: f64 = 1.10;
const SHRINK: f64 = 0.90;

/// Interval state for one upload loop.
#[derive(Debug, Clone)]
pub struct AdaptiveInterval {
    base: Duration,
    current: Duration,
}

impl AdaptiveInterval {
    /// Start at the default of 5x the base step.
    pub fn new(base: Duration) -> Self {
        Self { base, current: base * DEFAULT_FACTOR }
    }

    /// Interval to sleep before the next cycle.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// A batch was delivered and removed; poll sooner.
    pub fn record_progress(&mut self) {
        self.current = self.current.mul_f64(SHRINK).max(self.base * MIN_FACTOR);
    }

    /// Nothing was delivered this cycle; back off.
    pub fn record_no_progress(&mut self) {
        self.current = self.current.mul_f64(GROWTH).min(self.base * MAX_FACTOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_five_times_base() {
        let interval = AdaptiveInterval::new(Duration::from_secs(5));
        assert_eq!(interval.current(), Duration::from_secs(25));
    }

    #[test]
    fn repeated_no_progress_is_capped_at_ten_times_base() {
        let base = Duration::from_secs(5);
        let mut interval = AdaptiveInterval::new(base);

        for _ in 0..100 {
            interval.record_no_progress();
            assert!(interval.current() <= base * 10);
        }
        assert_eq!(interval.current(), base * 10);
    }

    #[test]
    fn repeated_progress_is_floored_at_base() {
        let base = Duration::from_secs(5);
        let mut interval = AdaptiveInterval::new(base);

        for _ in 0..100 {
            interval.record_progress();
            assert!(interval.current() >= base);
        }
        assert_eq!(interval.current(), base);
    }

    #[test]
    fn interval_moves_ten_percent_per_cycle() {
        let base = Duration::from_secs(10);
        let mut interval = AdaptiveInterval::new(base);

        interval.record_no_progress();
        assert_eq!(interval.current(), Duration::from_secs(55));

        interval.record_progress();
        assert_eq!(interval.current(), Duration::from_millis(49_500));
    }
}
