//! Error types for Breakwater

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for Breakwater
///
/// Rejections by an open breaker are not represented here; they are a distinct,
/// caller-visible kind owned by the breaker crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Whether this error was caused by invalid configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
