//! # Breakwater Circuit Breaker
//!
//! Fault isolation for calls to unreliable dependencies:
//! - Closed / Open / Half-Open state machine with lazy timeout evaluation
//! - Configurable trip policies (single failure, consecutive failures, failure rate)
//! - Single in-flight probe while half-open
//! - Event hook and metrics snapshot
//! - Registry of named breakers
//!
//! ```no_run
//! use breakwater_breaker::{BreakerConfig, CallError, CircuitBreaker, TripPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> breakwater_core::Result<()> {
//! let breaker = CircuitBreaker::new(
//!     "inventory",
//!     BreakerConfig::new(
//!         Duration::from_secs(5),
//!         TripPolicy::ConsecutiveFailures { threshold: 3 },
//!     ),
//! )?;
//!
//! match breaker.call(|| async { Ok::<_, std::io::Error>("stock") }).await {
//!     Ok(stock) => println!("got {stock}"),
//!     Err(CallError::Rejected(open)) => println!("retry in {:?}", open.remaining),
//!     Err(CallError::Inner(err)) => println!("dependency failed: {err}"),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod policy;
pub mod registry;

pub use breakwater_core::{CircuitState, Clock, ManualClock, MonotonicClock};
pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerBuilder};
pub use config::{BreakerConfig, DEFAULT_RESET_TIMEOUT};
pub use error::{CallError, CircuitOpenError};
pub use events::{listener_fn, BreakerEvent, EventListener, FnListener, TracingListener};
pub use metrics::BreakerMetrics;
pub use policy::TripPolicy;
pub use registry::BreakerRegistry;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerBuilder};
    pub use crate::config::BreakerConfig;
    pub use crate::error::{CallError, CircuitOpenError};
    pub use crate::events::{BreakerEvent, EventListener};
    pub use crate::metrics::BreakerMetrics;
    pub use crate::policy::TripPolicy;
    pub use crate::registry::BreakerRegistry;
    pub use breakwater_core::CircuitState;
}
