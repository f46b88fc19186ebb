//! Configuration validation

use crate::Config;
use breakwater_core::{Error, Result};
use std::time::Duration;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_breakers(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_breakers(config: &Config) -> Result<()> {
    let defaults = config.defaults.resolve();
    defaults
        .validate()
        .map_err(|e| Error::Config(format!("defaults: {}", strip_prefix(&e))))?;
    warn_on_long_timeout("defaults", defaults.reset_timeout);

    for name in config.breakers.keys() {
        if name.trim().is_empty() {
            return Err(Error::Config("breaker name cannot be empty".to_string()));
        }

        let resolved = config.breaker_config(name);
        resolved
            .validate()
            .map_err(|e| Error::Config(format!("breaker '{name}': {}", strip_prefix(&e))))?;
        warn_on_long_timeout(name, resolved.reset_timeout);
    }

    Ok(())
}

fn validate_logging(config: &Config) -> Result<()> {
    let logging = config.logging();
    if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
        return Err(Error::Config(format!(
            "Invalid log level: {} (must be one of {})",
            logging.level,
            LOG_LEVELS.join(", ")
        )));
    }
    Ok(())
}

fn warn_on_long_timeout(name: &str, timeout: Duration) {
    if timeout > Duration::from_secs(600) {
        tracing::warn!(
            breaker = %name,
            reset_timeout_secs = timeout.as_secs(),
            "reset_timeout is very high (>10 minutes)"
        );
    }
}

fn strip_prefix(err: &Error) -> String {
    match err {
        Error::Config(message) => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BreakerSettings, LoggingConfig};
    use breakwater_breaker::TripPolicy;

    #[test]
    fn test_valid_minimal_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_default_timeout() {
        let mut config = Config::default();
        config.defaults.reset_timeout = Some(Duration::ZERO);

        let err = validate_config(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: defaults: reset_timeout must be > 0"
        );
    }

    #[test]
    fn test_invalid_breaker_override_is_named() {
        let mut config = Config::default();
        config.breakers.insert(
            "ledger".to_string(),
            BreakerSettings {
                reset_timeout: None,
                policy: Some(TripPolicy::FailureRate {
                    threshold: 2.0,
                    min_requests: 10,
                }),
            },
        );

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("breaker 'ledger'"));
    }

    #[test]
    fn test_empty_breaker_name() {
        let mut config = Config::default();
        config
            .breakers
            .insert("  ".to_string(), BreakerSettings::default());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let config = Config {
            logging: Some(LoggingConfig {
                level: "verbose".to_string(),
                ..LoggingConfig::default()
            }),
            ..Config::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
