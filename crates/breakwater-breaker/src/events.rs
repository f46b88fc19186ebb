//! Observability hook for breaker decisions and transitions.
//!
//! The breaker defines the events; where they go is up to the registered
//! [`EventListener`]s. Listeners run on the calling task after the breaker's lock
//! has been released, so they may block briefly but must not call back into the
//! same breaker expecting a consistent view.
//!
//! Events caused by one caller arrive in the order that caller caused them.
//! Events from different threads are not serialized: two transitions racing on
//! separate threads may reach a listener in either order, so consult
//! [`CircuitBreaker::current_state`](crate::CircuitBreaker::current_state) when
//! the latest state matters.

use breakwater_core::CircuitState;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Something the breaker decided or observed
#[derive(Debug, Clone, PartialEq)]
pub enum BreakerEvent {
    /// The circuit moved between states
    StateTransition {
        /// Breaker name
        breaker: Arc<str>,
        /// Previous state
        from: CircuitState,
        /// New state
        to: CircuitState,
    },
    /// A call was admitted
    CallPermitted {
        /// Breaker name
        breaker: Arc<str>,
        /// State at admission
        state: CircuitState,
        /// Whether the call is the half-open trial
        probe: bool,
    },
    /// A call was rejected
    CallRejected {
        /// Breaker name
        breaker: Arc<str>,
        /// State at rejection
        state: CircuitState,
        /// Time until a probe will be admitted
        remaining: Duration,
    },
    /// A success was recorded
    SuccessRecorded {
        /// Breaker name
        breaker: Arc<str>,
        /// State after recording
        state: CircuitState,
    },
    /// A failure was recorded
    FailureRecorded {
        /// Breaker name
        breaker: Arc<str>,
        /// State after recording
        state: CircuitState,
    },
    /// The half-open trial was dropped without reporting an outcome
    ProbeAbandoned {
        /// Breaker name
        breaker: Arc<str>,
    },
}

impl BreakerEvent {
    /// Name of the breaker that produced the event
    pub fn breaker(&self) -> &str {
        match self {
            BreakerEvent::StateTransition { breaker, .. }
            | BreakerEvent::CallPermitted { breaker, .. }
            | BreakerEvent::CallRejected { breaker, .. }
            | BreakerEvent::SuccessRecorded { breaker, .. }
            | BreakerEvent::FailureRecorded { breaker, .. }
            | BreakerEvent::ProbeAbandoned { breaker } => breaker,
        }
    }

    /// Short, stable label suitable for a metric name or log field
    pub fn kind(&self) -> &'static str {
        match self {
            BreakerEvent::StateTransition { .. } => "state_transition",
            BreakerEvent::CallPermitted { .. } => "call_permitted",
            BreakerEvent::CallRejected { .. } => "call_rejected",
            BreakerEvent::SuccessRecorded { .. } => "success_recorded",
            BreakerEvent::FailureRecorded { .. } => "failure_recorded",
            BreakerEvent::ProbeAbandoned { .. } => "probe_abandoned",
        }
    }
}

impl fmt::Display for BreakerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerEvent::StateTransition { breaker, from, to } => {
                write!(f, "[{breaker}] {from} -> {to}")
            }
            BreakerEvent::CallPermitted {
                breaker,
                state,
                probe,
            } => {
                if *probe {
                    write!(f, "[{breaker}] probe call permitted ({state})")
                } else {
                    write!(f, "[{breaker}] call permitted ({state})")
                }
            }
            BreakerEvent::CallRejected {
                breaker,
                state,
                remaining,
            } => write!(f, "[{breaker}] call rejected ({state}, retry in {remaining:?})"),
            BreakerEvent::SuccessRecorded { breaker, state } => {
                write!(f, "[{breaker}] success recorded, now {state}")
            }
            BreakerEvent::FailureRecorded { breaker, state } => {
                write!(f, "[{breaker}] failure recorded, now {state}")
            }
            BreakerEvent::ProbeAbandoned { breaker } => {
                write!(f, "[{breaker}] probe abandoned without an outcome")
            }
        }
    }
}

/// Sink for breaker events
pub trait EventListener: Send + Sync {
    /// Called once per event on the thread that caused it
    fn on_event(&self, event: &BreakerEvent);
}

/// Adapter turning a closure into an [`EventListener`]
pub struct FnListener<F>(F);

impl<F> fmt::Debug for FnListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnListener").finish_non_exhaustive()
    }
}

impl<F> EventListener for FnListener<F>
where
    F: Fn(&BreakerEvent) + Send + Sync,
{
    fn on_event(&self, event: &BreakerEvent) {
        (self.0)(event)
    }
}

/// Wrap a closure as a shareable listener
pub fn listener_fn<F>(f: F) -> Arc<dyn EventListener>
where
    F: Fn(&BreakerEvent) + Send + Sync + 'static,
{
    Arc::new(FnListener(f))
}

/// Listener that forwards every event to `tracing`
///
/// Transitions into open log at `warn`, other transitions at `info`, and the
/// per-call events at `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl EventListener for TracingListener {
    fn on_event(&self, event: &BreakerEvent) {
        match event {
            BreakerEvent::StateTransition { breaker, from, to } => {
                if *to == CircuitState::Open {
                    tracing::warn!(breaker = %breaker, from = %from, to = %to, "circuit opened");
                } else {
                    tracing::info!(breaker = %breaker, from = %from, to = %to, "circuit state changed");
                }
            }
            BreakerEvent::ProbeAbandoned { breaker } => {
                tracing::info!(breaker = %breaker, "probe abandoned without an outcome");
            }
            other => {
                tracing::debug!(breaker = other.breaker(), kind = other.kind(), "{other}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_event_accessors() {
        let event = BreakerEvent::CallRejected {
            breaker: Arc::from("inventory"),
            state: CircuitState::Open,
            remaining: Duration::from_secs(2),
        };
        assert_eq!(event.breaker(), "inventory");
        assert_eq!(event.kind(), "call_rejected");
        assert_eq!(
            event.to_string(),
            "[inventory] call rejected (open, retry in 2s)"
        );
    }

    #[test]
    fn test_transition_display() {
        let event = BreakerEvent::StateTransition {
            breaker: Arc::from("db"),
            from: CircuitState::HalfOpen,
            to: CircuitState::Open,
        };
        assert_eq!(event.to_string(), "[db] half-open -> open");
    }

    #[test]
    fn test_listener_fn() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener = listener_fn(move |event| sink.lock().push(event.kind()));

        listener.on_event(&BreakerEvent::ProbeAbandoned {
            breaker: Arc::from("db"),
        });
        assert_eq!(*seen.lock(), vec!["probe_abandoned"]);
    }

    #[test]
    fn test_tracing_listener_accepts_every_kind() {
        let listener = TracingListener;
        let breaker: Arc<str> = Arc::from("db");
        for event in [
            BreakerEvent::StateTransition {
                breaker: breaker.clone(),
                from: CircuitState::HalfOpen,
                to: CircuitState::Open,
            },
            BreakerEvent::SuccessRecorded {
                breaker: breaker.clone(),
                state: CircuitState::Closed,
            },
            BreakerEvent::ProbeAbandoned { breaker },
        ] {
            listener.on_event(&event);
        }
    }
}
