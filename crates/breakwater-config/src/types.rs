//! Configuration types

use breakwater_breaker::{BreakerConfig, TripPolicy, DEFAULT_RESET_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Settings every breaker starts from
    #[serde(default)]
    pub defaults: BreakerSettings,

    /// Per-breaker overrides, keyed by breaker name
    #[serde(default)]
    pub breakers: BTreeMap<String, BreakerSettings>,

    /// Logging
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

/// Breaker settings; unset fields fall back to the layer below
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BreakerSettings {
    /// How long an open circuit waits before admitting a probe
    #[serde(default, with = "humantime_serde")]
    pub reset_timeout: Option<Duration>,

    /// Trip policy
    #[serde(default)]
    pub policy: Option<TripPolicy>,
}

impl BreakerSettings {
    /// Settings from `over`, falling back to `self` for anything `over` leaves unset
    pub fn overlay(&self, over: &BreakerSettings) -> BreakerSettings {
        BreakerSettings {
            reset_timeout: over.reset_timeout.or(self.reset_timeout),
            policy: over.policy.clone().or_else(|| self.policy.clone()),
        }
    }

    /// Fill remaining gaps with built-in defaults
    pub fn resolve(&self) -> BreakerConfig {
        BreakerConfig::new(
            self.reset_timeout.unwrap_or(DEFAULT_RESET_TIMEOUT),
            self.policy.clone().unwrap_or_default(),
        )
    }
}

impl Config {
    /// Effective configuration for the named breaker (not validated)
    pub fn breaker_config(&self, name: &str) -> BreakerConfig {
        match self.breakers.get(name) {
            Some(settings) => self.defaults.overlay(settings).resolve(),
            None => self.defaults.resolve(),
        }
    }

    /// Logging configuration, defaulted when absent
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable text
    #[default]
    Text,
    /// One JSON object per line
    Json,
}
