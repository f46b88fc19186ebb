//! # Breakwater Core
//!
//! Core types, traits, and error handling shared by the Breakwater crates.
//!
//! This crate provides the foundational abstractions used throughout the workspace:
//! - The [`CircuitState`] enum
//! - The [`Clock`] trait with monotonic and manual implementations
//! - Error types

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod clock;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{Error, Result};
pub use types::CircuitState;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, MonotonicClock};
    pub use crate::error::{Error, Result};
    pub use crate::types::CircuitState;
}
