//! Common types used throughout Breakwater

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Circuit is closed, calls pass through normally
    Closed,
    /// Circuit is open, calls are rejected without reaching the dependency
    Open,
    /// Circuit is half-open, a single trial call tests recovery
    HalfOpen,
}

impl CircuitState {
    /// All states, in declaration order
    pub const ALL: [CircuitState; 3] = [
        CircuitState::Closed,
        CircuitState::Open,
        CircuitState::HalfOpen,
    ];
}

impl Default for CircuitState {
    fn default() -> Self {
        Self::Closed
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

impl FromStr for CircuitState {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "closed" => Ok(CircuitState::Closed),
            "open" => Ok(CircuitState::Open),
            "half-open" | "half_open" | "halfopen" => Ok(CircuitState::HalfOpen),
            other => Err(crate::Error::config(format!(
                "Unknown circuit state: {other}"
            ))),
        }
    }
}
