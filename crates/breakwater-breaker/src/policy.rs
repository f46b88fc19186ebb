//! Trip policies: how failures observed while closed decide when to leave `Closed`.

use breakwater_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Policy applied to outcomes observed while the circuit is closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TripPolicy {
    /// Any failure moves the circuit straight to half-open probation
    SingleFailure,
    /// Open after `threshold` consecutive failures
    ConsecutiveFailures {
        /// Consecutive failures required to open the circuit
        threshold: u32,
    },
    /// Open once the failure ratio since the last close reaches `threshold`
    FailureRate {
        /// Failure ratio (0.0, 1.0] that opens the circuit
        threshold: f64,
        /// Minimum outcomes observed before the ratio is evaluated
        min_requests: u64,
    },
}

impl Default for TripPolicy {
    fn default() -> Self {
        Self::SingleFailure
    }
}

/// What a closed circuit should do after recording an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trip {
    /// Stay closed
    Hold,
    /// Move to half-open
    Probation,
    /// Open the circuit
    Open,
}

/// Outcome accounting kept while the circuit is closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FailureWindow {
    pub(crate) consecutive_failures: u32,
    pub(crate) successes: u64,
    pub(crate) failures: u64,
}

impl FailureWindow {
    fn total(&self) -> u64 {
        self.successes.saturating_add(self.failures)
    }

    pub(crate) fn failure_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.failures as f64 / total as f64,
        }
    }
}

impl TripPolicy {
    /// Reject thresholds that could never (or would always) trip
    pub fn validate(&self) -> Result<()> {
        match self {
            TripPolicy::SingleFailure => Ok(()),
            TripPolicy::ConsecutiveFailures { threshold } => {
                if *threshold == 0 {
                    return Err(Error::config(
                        "consecutive_failures threshold must be > 0",
                    ));
                }
                Ok(())
            }
            TripPolicy::FailureRate {
                threshold,
                min_requests,
            } => {
                if !(*threshold > 0.0 && *threshold <= 1.0) {
                    return Err(Error::config(format!(
                        "failure_rate threshold must be in (0.0, 1.0], got {threshold}"
                    )));
                }
                if *min_requests == 0 {
                    return Err(Error::config("failure_rate min_requests must be > 0"));
                }
                Ok(())
            }
        }
    }

    pub(crate) fn record_success(&self, window: &mut FailureWindow) {
        window.successes = window.successes.saturating_add(1);
        window.consecutive_failures = 0;
    }

    pub(crate) fn record_failure(&self, window: &mut FailureWindow) -> Trip {
        window.failures = window.failures.saturating_add(1);
        window.consecutive_failures = window.consecutive_failures.saturating_add(1);

        match self {
            TripPolicy::SingleFailure => Trip::Probation,
            TripPolicy::ConsecutiveFailures { threshold } => {
                if window.consecutive_failures >= *threshold {
                    Trip::Open
                } else {
                    Trip::Hold
                }
            }
            TripPolicy::FailureRate {
                threshold,
                min_requests,
            } => {
                if window.total() >= *min_requests && window.failure_rate() >= *threshold {
                    Trip::Open
                } else {
                    Trip::Hold
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_failure_trips_immediately() {
        let policy = TripPolicy::SingleFailure;
        let mut window = FailureWindow::default();
        assert_eq!(policy.record_failure(&mut window), Trip::Probation);
    }

    #[test]
    fn test_consecutive_failures_reset_on_success() {
        let policy = TripPolicy::ConsecutiveFailures { threshold: 3 };
        let mut window = FailureWindow::default();

        assert_eq!(policy.record_failure(&mut window), Trip::Hold);
        assert_eq!(policy.record_failure(&mut window), Trip::Hold);
        policy.record_success(&mut window);
        assert_eq!(window.consecutive_failures, 0);

        assert_eq!(policy.record_failure(&mut window), Trip::Hold);
        assert_eq!(policy.record_failure(&mut window), Trip::Hold);
        assert_eq!(policy.record_failure(&mut window), Trip::Open);
    }

    #[test]
    fn test_failure_rate_waits_for_min_requests() {
        let policy = TripPolicy::FailureRate {
            threshold: 0.5,
            min_requests: 5,
        };
        let mut window = FailureWindow::default();

        policy.record_success(&mut window);
        policy.record_success(&mut window);
        assert_eq!(policy.record_failure(&mut window), Trip::Hold);
        assert_eq!(policy.record_failure(&mut window), Trip::Hold);
        // 3/5 = 60% failure rate >= 50% threshold
        assert_eq!(policy.record_failure(&mut window), Trip::Open);
        assert!((window.failure_rate() - 0.6).abs() < 1e-10);
    }

    #[test]
    fn test_failure_rate_below_threshold_holds() {
        let policy = TripPolicy::FailureRate {
            threshold: 0.5,
            min_requests: 4,
        };
        let mut window = FailureWindow::default();

        for _ in 0..3 {
            policy.record_success(&mut window);
        }
        assert_eq!(policy.record_failure(&mut window), Trip::Hold);
    }

    #[test]
    fn test_validate() {
        assert!(TripPolicy::SingleFailure.validate().is_ok());
        assert!(TripPolicy::ConsecutiveFailures { threshold: 0 }
            .validate()
            .is_err());
        assert!(TripPolicy::FailureRate {
            threshold: 1.5,
            min_requests: 10
        }
        .validate()
        .is_err());
        assert!(TripPolicy::FailureRate {
            threshold: 0.0,
            min_requests: 10
        }
        .validate()
        .is_err());
        assert!(TripPolicy::FailureRate {
            threshold: 0.5,
            min_requests: 0
        }
        .validate()
        .is_err());
        assert!(TripPolicy::FailureRate {
            threshold: 1.0,
            min_requests: 1
        }
        .validate()
        .is_ok());
    }
}
