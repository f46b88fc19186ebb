//! Circuit breaker state machine.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a single trial call tests whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed    → Half-Open: failure under the single-failure policy
//! Closed    → Open:      failure that crosses a threshold policy
//! Open      → Half-Open: reset timeout elapsed (checked lazily on the next call,
//!                        or explicitly via `check_timeout`)
//! Half-Open → Closed:    trial call succeeds
//! Half-Open → Open:      trial call fails
//! ```
//!
//! The lock guarding the state is held only while deciding admission and while
//! recording an outcome, never while the protected operation runs.

use crate::config::BreakerConfig;
use crate::error::{CallError, CircuitOpenError};
use crate::events::{BreakerEvent, EventListener};
use crate::metrics::{BreakerMetrics, Counters};
use crate::policy::{FailureWindow, Trip};
use breakwater_core::{CircuitState, Clock, MonotonicClock, Result};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Current state together with the data that only exists in that state
#[derive(Debug, Clone, Copy, PartialEq)]
enum BreakerState {
    Closed { window: FailureWindow },
    Open { opened_at: Instant },
    HalfOpen { probe_in_flight: bool },
}

impl BreakerState {
    fn closed() -> Self {
        BreakerState::Closed {
            window: FailureWindow::default(),
        }
    }

    fn kind(&self) -> CircuitState {
        match self {
            BreakerState::Closed { .. } => CircuitState::Closed,
            BreakerState::Open { .. } => CircuitState::Open,
            BreakerState::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

/// Input to the transition function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Success,
    Failure,
    /// Re-evaluate the reset timeout
    Tick,
}

/// Next state for `state` after `signal` observed at `now`
fn transition(
    config: &BreakerConfig,
    state: BreakerState,
    signal: Signal,
    now: Instant,
) -> BreakerState {
    match (state, signal) {
        (BreakerState::Closed { mut window }, Signal::Success) => {
            config.policy.record_success(&mut window);
            BreakerState::Closed { window }
        }
        (BreakerState::Closed { mut window }, Signal::Failure) => {
            match config.policy.record_failure(&mut window) {
                Trip::Hold => BreakerState::Closed { window },
                Trip::Probation => BreakerState::HalfOpen {
                    probe_in_flight: false,
                },
                Trip::Open => BreakerState::Open { opened_at: now },
            }
        }
        (BreakerState::HalfOpen { .. }, Signal::Success) => BreakerState::closed(),
        (BreakerState::HalfOpen { .. }, Signal::Failure) => BreakerState::Open { opened_at: now },
        (BreakerState::Open { opened_at }, Signal::Tick)
            if now.saturating_duration_since(opened_at) >= config.reset_timeout =>
        {
            BreakerState::HalfOpen {
                probe_in_flight: false,
            }
        }
        (BreakerState::Closed { .. }, Signal::Tick) | (BreakerState::HalfOpen { .. }, Signal::Tick) => {
            state
        }
        // Outcomes of calls admitted before the circuit opened change nothing
        (BreakerState::Open { .. }, _) => state,
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    /// Bumped on every state change; lets a permit tell whether its half-open
    /// window is still the current one
    generation: u64,
}

type Change = Option<(CircuitState, CircuitState)>;

impl Inner {
    fn replace(&mut self, next: BreakerState) -> Change {
        let from = self.state.kind();
        let to = next.kind();
        self.state = next;
        if from == to {
            return None;
        }
        self.generation = self.generation.wrapping_add(1);
        Some((from, to))
    }
}

/// Who is reporting an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// `record_success` / `record_failure` called directly
    External,
    /// A permit issued under `generation`
    Permit { generation: u64, probe: bool },
}

impl Origin {
    /// Whether this report may move the circuit while a trial is in flight
    fn owns_trial(&self, current_generation: u64) -> bool {
        matches!(
            self,
            Origin::Permit { generation, probe: true } if *generation == current_generation
        )
    }
}

/// Admission decision taken under the lock
enum Admission {
    Permit { probe: bool, generation: u64 },
    Reject { state: CircuitState, remaining: Duration },
}

/// Circuit breaker guarding one downstream dependency
pub struct CircuitBreaker {
    name: Arc<str>,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
    counters: Counters,
    listeners: Vec<Arc<dyn EventListener>>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("state", &self.current_state())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a breaker using the monotonic system clock
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Result<Self> {
        CircuitBreakerBuilder::new(name).config(config).build()
    }

    /// Create a breaker with the default configuration
    pub fn default_config(name: impl Into<String>) -> Self {
        Self::from_parts(
            name.into(),
            BreakerConfig::default(),
            Arc::new(MonotonicClock),
            Vec::new(),
        )
    }

    /// Start building a breaker
    pub fn builder(name: impl Into<String>) -> CircuitBreakerBuilder {
        CircuitBreakerBuilder::new(name)
    }

    /// Construct from an already validated configuration
    pub(crate) fn from_parts(
        name: String,
        config: BreakerConfig,
        clock: Arc<dyn Clock>,
        listeners: Vec<Arc<dyn EventListener>>,
    ) -> Self {
        info!(
            breaker = %name,
            reset_timeout_ms = config.reset_timeout.as_millis(),
            policy = ?config.policy,
            "Circuit breaker initialized"
        );

        Self {
            name: Arc::from(name),
            config,
            clock,
            inner: Mutex::new(Inner {
                state: BreakerState::closed(),
                generation: 0,
            }),
            counters: Counters::default(),
            listeners,
        }
    }

    /// Breaker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration in effect
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Snapshot of the current state.
    ///
    /// Timeouts are evaluated lazily, so an open circuit whose reset timeout has
    /// already passed still reports `Open` until a call or [`check_timeout`]
    /// moves it on.
    ///
    /// [`check_timeout`]: CircuitBreaker::check_timeout
    pub fn current_state(&self) -> CircuitState {
        self.inner.lock().state.kind()
    }

    /// When the circuit last opened, present only while it is open
    pub fn opened_at(&self) -> Option<Instant> {
        match self.inner.lock().state {
            BreakerState::Open { opened_at } => Some(opened_at),
            BreakerState::Closed { .. } | BreakerState::HalfOpen { .. } => None,
        }
    }

    /// Current metrics snapshot
    pub fn metrics(&self) -> BreakerMetrics {
        self.counters.snapshot(self.current_state())
    }

    /// Execute an async operation with circuit breaker protection.
    ///
    /// The operation is only invoked when the breaker admits the call. Its error,
    /// if any, is recorded as a failure and returned unchanged inside
    /// [`CallError::Inner`].
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.try_acquire()?;

        match operation().await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(err) => {
                permit.failure();
                Err(CallError::Inner(err))
            }
        }
    }

    /// Blocking counterpart of [`call`](CircuitBreaker::call)
    pub fn call_sync<F, T, E>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let permit = self.try_acquire()?;

        match operation() {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(err) => {
                permit.failure();
                Err(CallError::Inner(err))
            }
        }
    }

    /// Ask for admission without running anything.
    ///
    /// The returned permit must report the outcome through
    /// [`CallPermit::success`] or [`CallPermit::failure`]. Dropping it unreported
    /// releases a half-open trial slot without recording anything.
    pub fn try_acquire(&self) -> std::result::Result<CallPermit<'_>, CircuitOpenError> {
        let now = self.clock.now();

        let (admission, change) = {
            let mut inner = self.inner.lock();
            let next = transition(&self.config, inner.state, Signal::Tick, now);
            let change = inner.replace(next);
            let generation = inner.generation;

            let admission = match &mut inner.state {
                BreakerState::Closed { .. } => Admission::Permit {
                    probe: false,
                    generation,
                },
                BreakerState::HalfOpen { probe_in_flight } => {
                    if *probe_in_flight {
                        Admission::Reject {
                            state: CircuitState::HalfOpen,
                            remaining: Duration::ZERO,
                        }
                    } else {
                        *probe_in_flight = true;
                        Admission::Permit {
                            probe: true,
                            generation,
                        }
                    }
                }
                BreakerState::Open { opened_at } => {
                    let elapsed = now.saturating_duration_since(*opened_at);
                    Admission::Reject {
                        state: CircuitState::Open,
                        remaining: self.config.reset_timeout.saturating_sub(elapsed),
                    }
                }
            };

            (admission, change)
        };

        self.announce(change);

        match admission {
            Admission::Permit { probe, generation } => {
                self.counters.permitted();
                let state = if probe {
                    CircuitState::HalfOpen
                } else {
                    CircuitState::Closed
                };
                debug!(breaker = %self.name, %state, probe, "Call permitted");
                self.emit(BreakerEvent::CallPermitted {
                    breaker: self.name.clone(),
                    state,
                    probe,
                });

                Ok(CallPermit {
                    breaker: self,
                    generation,
                    probe,
                    settled: false,
                })
            }
            Admission::Reject { state, remaining } => {
                self.counters.rejected();
                debug!(
                    breaker = %self.name,
                    %state,
                    remaining_ms = remaining.as_millis(),
                    "Call rejected"
                );
                self.emit(BreakerEvent::CallRejected {
                    breaker: self.name.clone(),
                    state,
                    remaining,
                });

                Err(CircuitOpenError {
                    breaker: self.name.to_string(),
                    state,
                    remaining,
                })
            }
        }
    }

    /// Record a successful call made outside [`call`](CircuitBreaker::call)
    pub fn record_success(&self) {
        self.record(Signal::Success, Origin::External);
    }

    /// Record a failed call made outside [`call`](CircuitBreaker::call)
    pub fn record_failure(&self) {
        self.record(Signal::Failure, Origin::External);
    }

    /// Evaluate the reset timeout now instead of waiting for the next call.
    ///
    /// Returns the time left while the circuit stays open, `None` otherwise.
    pub fn check_timeout(&self) -> Option<Duration> {
        let now = self.clock.now();

        let (remaining, change) = {
            let mut inner = self.inner.lock();
            let next = transition(&self.config, inner.state, Signal::Tick, now);
            let change = inner.replace(next);
            let remaining = match inner.state {
                BreakerState::Open { opened_at } => Some(
                    self.config
                        .reset_timeout
                        .saturating_sub(now.saturating_duration_since(opened_at)),
                ),
                BreakerState::Closed { .. } | BreakerState::HalfOpen { .. } => None,
            };
            (remaining, change)
        };

        self.announce(change);
        remaining
    }

    /// Force the circuit back to closed and clear all counters
    pub fn reset(&self) {
        self.counters.reset();
        let change = self.inner.lock().replace(BreakerState::closed());
        self.announce(change);
        info!(breaker = %self.name, "Circuit breaker reset");
    }

    /// Force the circuit open, starting a fresh reset timeout
    pub fn force_open(&self) {
        let opened_at = self.clock.now();
        let change = self.inner.lock().replace(BreakerState::Open { opened_at });
        warn!(breaker = %self.name, "Circuit breaker forced open");
        self.announce(change);
    }

    fn record(&self, signal: Signal, origin: Origin) {
        let now = self.clock.now();

        let (state, change) = {
            let mut inner = self.inner.lock();
            // While a trial is running only the trial itself decides the outcome
            let applies = match inner.state {
                BreakerState::HalfOpen {
                    probe_in_flight: true,
                } => origin.owns_trial(inner.generation),
                BreakerState::Closed { .. }
                | BreakerState::Open { .. }
                | BreakerState::HalfOpen {
                    probe_in_flight: false,
                } => true,
            };

            let change = if applies {
                let next = transition(&self.config, inner.state, signal, now);
                inner.replace(next)
            } else {
                debug!(breaker = %self.name, ?signal, "Outcome ignored while trial in flight");
                None
            };
            (inner.state.kind(), change)
        };

        match signal {
            Signal::Success => {
                self.counters.success();
                debug!(breaker = %self.name, %state, "Circuit breaker recorded success");
                self.emit(BreakerEvent::SuccessRecorded {
                    breaker: self.name.clone(),
                    state,
                });
            }
            Signal::Failure => {
                self.counters.failure();
                debug!(breaker = %self.name, %state, "Circuit breaker recorded failure");
                self.emit(BreakerEvent::FailureRecorded {
                    breaker: self.name.clone(),
                    state,
                });
            }
            Signal::Tick => {}
        }

        self.announce(change);
    }

    /// Free the half-open trial slot held by a permit that never reported back
    fn abandon_probe(&self, generation: u64) {
        let released = {
            let mut inner = self.inner.lock();
            let current = inner.generation == generation;
            match &mut inner.state {
                BreakerState::HalfOpen { probe_in_flight } if current && *probe_in_flight => {
                    *probe_in_flight = false;
                    true
                }
                _ => false,
            }
        };

        if released {
            warn!(breaker = %self.name, "Half-open probe dropped without an outcome");
            self.emit(BreakerEvent::ProbeAbandoned {
                breaker: self.name.clone(),
            });
        }
    }

    fn announce(&self, change: Change) {
        let Some((from, to)) = change else {
            return;
        };

        self.counters.transition();
        match to {
            CircuitState::Open => warn!(
                breaker = %self.name,
                %from,
                reset_timeout_ms = self.config.reset_timeout.as_millis(),
                "Circuit breaker transitioned to OPEN"
            ),
            CircuitState::HalfOpen => {
                info!(breaker = %self.name, %from, "Circuit breaker transitioned to HALF-OPEN")
            }
            CircuitState::Closed => {
                info!(breaker = %self.name, %from, "Circuit breaker transitioned to CLOSED")
            }
        }

        self.emit(BreakerEvent::StateTransition {
            breaker: self.name.clone(),
            from,
            to,
        });
    }

    fn emit(&self, event: BreakerEvent) {
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }
}

/// Proof of admission for one call.
///
/// Reporting consumes the permit. A probe permit dropped without reporting frees
/// the half-open slot so another caller can try.
#[must_use = "report the outcome with `success()` or `failure()`"]
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    probe: bool,
    settled: bool,
}

impl CallPermit<'_> {
    /// Whether this permit is the half-open trial call
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Report that the call succeeded
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record(Signal::Success, self.origin());
    }

    /// Report that the call failed
    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record(Signal::Failure, self.origin());
    }

    fn origin(&self) -> Origin {
        Origin::Permit {
            generation: self.generation,
            probe: self.probe,
        }
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.abandon_probe(self.generation);
        }
    }
}

/// Builder for [`CircuitBreaker`]
pub struct CircuitBreakerBuilder {
    name: String,
    config: BreakerConfig,
    clock: Option<Arc<dyn Clock>>,
    listeners: Vec<Arc<dyn EventListener>>,
}

impl fmt::Debug for CircuitBreakerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl CircuitBreakerBuilder {
    /// Create a builder with the default configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: BreakerConfig::default(),
            clock: None,
            listeners: Vec::new(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: BreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the reset timeout
    pub fn reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.config.reset_timeout = reset_timeout;
        self
    }

    /// Set the trip policy
    pub fn policy(mut self, policy: crate::TripPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Use a specific clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Add an event listener
    pub fn listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Validate the configuration and build the breaker
    pub fn build(self) -> Result<CircuitBreaker> {
        self.config.validate()?;

        Ok(CircuitBreaker::from_parts(
            self.name,
            self.config,
            self.clock.unwrap_or_else(|| Arc::new(MonotonicClock)),
            self.listeners,
        ))
    }
}
