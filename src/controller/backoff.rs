//! # Fibonacci Backoff
//!
//! Retry delays for failed reconciliation passes. Each Export keeps its own
//! sequence so one broken export never slows down the others.
//!
//! ```rust
//! use export_controller::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(5, 60);
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 5);
//! assert_eq!(backoff.next_backoff_seconds(), 10);
//! assert_eq!(backoff.next_backoff_seconds(), 15);
//! ```

use std::time::Duration;

/// Fibonacci sequence scaled by a minimum step and capped at a maximum (seconds)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibonacciBackoff {
    min_secs: u64,
    max_secs: u64,
    prev: u64,
    current: u64,
}

impl FibonacciBackoff {
    /// A zero minimum is raised to one second; a maximum below the minimum is raised to it
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        let max_secs = max_secs.max(min_secs);
        Self {
            min_secs,
            max_secs,
            prev: 0,
            current: min_secs,
        }
    }

    /// Next delay in seconds, advancing the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let delay = self.current.min(self.max_secs);
        let next = self.prev.saturating_add(self.current);
        self.prev = self.current;
        self.current = next.min(self.max_secs);
        delay
    }

    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Restart from the minimum delay
    pub fn reset(&mut self) {
        self.prev = 0;
        self.current = self.min_secs;
    }
}
