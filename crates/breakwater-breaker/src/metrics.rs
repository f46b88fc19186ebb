//! Per-breaker call accounting

use breakwater_core::CircuitState;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifetime counters, updated without taking the breaker's lock
#[derive(Debug, Default)]
pub(crate) struct Counters {
    permitted: AtomicU64,
    rejected: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    transitions: AtomicU64,
}

impl Counters {
    pub(crate) fn permitted(&self) {
        self.permitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.permitted.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.transitions.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, state: CircuitState) -> BreakerMetrics {
        let successes = self.successes.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let completed = successes + failures;

        BreakerMetrics {
            state,
            permitted: self.permitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            successes,
            failures,
            transitions: self.transitions.load(Ordering::Relaxed),
            failure_rate: if completed > 0 {
                failures as f64 / completed as f64
            } else {
                0.0
            },
        }
    }
}

/// Circuit breaker metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerMetrics {
    /// Current state
    pub state: CircuitState,
    /// Calls admitted to the operation
    pub permitted: u64,
    /// Calls rejected without running
    pub rejected: u64,
    /// Recorded successes
    pub successes: u64,
    /// Recorded failures
    pub failures: u64,
    /// State transitions taken
    pub transitions: u64,
    /// Failure rate over recorded outcomes (0.0 to 1.0)
    pub failure_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_failure_rate() {
        let counters = Counters::default();
        counters.success();
        counters.success();
        counters.failure();
        counters.rejected();

        let metrics = counters.snapshot(CircuitState::Closed);
        assert_eq!(metrics.successes, 2);
        assert_eq!(metrics.failures, 1);
        assert_eq!(metrics.rejected, 1);
        assert!((metrics.failure_rate - 1.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_metrics_serialize() {
        let counters = Counters::default();
        counters.permitted();
        counters.failure();
        counters.transition();

        let json = serde_json::to_value(counters.snapshot(CircuitState::HalfOpen)).unwrap();
        assert_eq!(json["state"], "half_open");
        assert_eq!(json["permitted"], 1);
        assert_eq!(json["failures"], 1);
        assert_eq!(json["transitions"], 1);
        assert_eq!(json["failure_rate"], 1.0);
    }

    #[test]
    fn test_reset() {
        let counters = Counters::default();
        counters.permitted();
        counters.transition();
        counters.reset();

        let metrics = counters.snapshot(CircuitState::Closed);
        assert_eq!(metrics.permitted, 0);
        assert_eq!(metrics.transitions, 0);
        assert_eq!(metrics.failure_rate, 0.0);
    }
}
