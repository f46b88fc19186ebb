//! Runtime configuration for a single breaker

use crate::policy::TripPolicy;
use breakwater_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time an open circuit waits before admitting a probe
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(5);

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Duration to stay open before transitioning to half-open
    pub reset_timeout: Duration,
    /// When failures observed while closed trip the circuit
    pub policy: TripPolicy,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            policy: TripPolicy::default(),
        }
    }
}

impl BreakerConfig {
    /// Create a configuration with the given reset timeout and trip policy
    pub fn new(reset_timeout: Duration, policy: TripPolicy) -> Self {
        Self {
            reset_timeout,
            policy,
        }
    }

    /// Set the reset timeout
    pub fn with_reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.reset_timeout = reset_timeout;
        self
    }

    /// Set the trip policy
    pub fn with_policy(mut self, policy: TripPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fail fast on values the breaker cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.reset_timeout.is_zero() {
            return Err(Error::config("reset_timeout must be > 0"));
        }
        self.policy.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BreakerConfig::default();
        assert_eq!(config.reset_timeout, Duration::from_secs(5));
        assert_eq!(config.policy, TripPolicy::SingleFailure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_reset_timeout_rejected() {
        let config = BreakerConfig::default().with_reset_timeout(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("reset_timeout"));
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let config = BreakerConfig::default()
            .with_policy(TripPolicy::ConsecutiveFailures { threshold: 0 });
        assert!(config.validate().is_err());
    }
}
