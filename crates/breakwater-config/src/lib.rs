//! # Breakwater Configuration
//!
//! Configuration management with support for:
//! - Multiple formats (YAML, TOML, JSON)
//! - Environment variable expansion
//! - Layered files merged in order
//! - Validation
//! - Default values

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod loader;
pub mod merger;
pub mod types;
pub mod validator;

pub use loader::{load_and_merge, load_config, load_from_file, load_from_str};
pub use merger::merge_configs;
pub use types::{BreakerSettings, Config, LogFormat, LoggingConfig};
pub use validator::validate_config;

use breakwater_breaker::BreakerRegistry;
use breakwater_core::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Load and validate configuration from a file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    load_config(path)
}

/// Load configuration from a string
pub fn load_str(content: &str, format: ConfigFormat) -> Result<Config> {
    load_from_str(content, format)
}

/// Build a registry whose breakers follow this configuration
pub fn build_registry(config: &Config) -> Result<BreakerRegistry> {
    let overrides: HashMap<_, _> = config
        .breakers
        .keys()
        .map(|name| (name.clone(), config.breaker_config(name)))
        .collect();

    BreakerRegistry::with_overrides(config.defaults.resolve(), overrides)
}

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Config("Unable to detect config format".to_string()))?;

        match ext {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "toml" => Ok(ConfigFormat::Toml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(Error::Config(format!("Unsupported config format: {}", ext))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use breakwater_breaker::{CircuitState, TripPolicy};
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_detect_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(&PathBuf::from("breakers.yaml")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(&PathBuf::from("breakers.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(&PathBuf::from("breakers.json")).unwrap(),
            ConfigFormat::Json
        );
    }

    #[test]
    fn test_unsupported_format() {
        assert!(ConfigFormat::from_path(&PathBuf::from("breakers.txt")).is_err());
        assert!(ConfigFormat::from_path(&PathBuf::from("breakers")).is_err());
    }

    #[test]
    fn test_build_registry() {
        let config = load_str(
            r#"
defaults:
  reset_timeout: 2s
breakers:
  payments:
    policy:
      type: consecutive_failures
      threshold: 2
"#,
            ConfigFormat::Yaml,
        )
        .unwrap();

        let registry = build_registry(&config).unwrap();
        let payments = registry.get_or_create("payments");
        assert_eq!(payments.config().reset_timeout, Duration::from_secs(2));
        assert_eq!(
            payments.config().policy,
            TripPolicy::ConsecutiveFailures { threshold: 2 }
        );

        payments.record_failure();
        assert_eq!(payments.current_state(), CircuitState::Closed);

        let search = registry.get_or_create("search");
        search.record_failure();
        assert_eq!(search.current_state(), CircuitState::HalfOpen);
    }
}
