//! Errors surfaced by [`CircuitBreaker::call`](crate::CircuitBreaker::call)

use breakwater_core::CircuitState;
use std::time::Duration;

/// A call was rejected without reaching the protected operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Circuit breaker '{breaker}' is {state}, call rejected (retry in {remaining:?})")]
pub struct CircuitOpenError {
    /// Name of the rejecting breaker
    pub breaker: String,
    /// State the breaker was in when it rejected the call
    pub state: CircuitState,
    /// Time left until the breaker will admit a probe
    ///
    /// Zero when the rejection came from a half-open breaker whose single probe is
    /// still in flight.
    pub remaining: Duration,
}

/// Error returned by a protected call
#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    /// The breaker rejected the call; the operation never ran
    #[error(transparent)]
    Rejected(#[from] CircuitOpenError),

    /// The operation ran and failed; its error is passed through untouched
    #[error("{0}")]
    Inner(E),
}

impl<E> CallError<E> {
    /// Whether the breaker rejected the call
    pub fn is_rejected(&self) -> bool {
        matches!(self, CallError::Rejected(_))
    }

    /// The rejection, if the breaker refused the call
    pub fn rejection(&self) -> Option<&CircuitOpenError> {
        match self {
            CallError::Rejected(err) => Some(err),
            CallError::Inner(_) => None,
        }
    }

    /// The operation's own error, if it ran and failed
    pub fn into_inner(self) -> Option<E> {
        match self {
            CallError::Rejected(_) => None,
            CallError::Inner(err) => Some(err),
        }
    }
}
