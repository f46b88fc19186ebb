//! Named breakers created on demand

use crate::circuit_breaker::CircuitBreaker;
use crate::config::BreakerConfig;
use crate::events::EventListener;
use crate::metrics::BreakerMetrics;
use breakwater_core::{CircuitState, Clock, MonotonicClock, Result};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Registry of circuit breakers keyed by dependency name
#[derive(Clone)]
pub struct BreakerRegistry {
    defaults: BreakerConfig,
    overrides: Arc<HashMap<String, BreakerConfig>>,
    clock: Arc<dyn Clock>,
    listeners: Arc<Vec<Arc<dyn EventListener>>>,
    breakers: Arc<DashMap<String, Arc<CircuitBreaker>>>,
}

impl fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("defaults", &self.defaults)
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .field("breakers", &self.breakers.len())
            .finish()
    }
}

impl BreakerRegistry {
    /// Create a registry whose breakers use `defaults` unless overridden
    pub fn new(defaults: BreakerConfig) -> Result<Self> {
        Self::with_overrides(defaults, HashMap::new())
    }

    /// Create a registry with per-name configuration overrides
    pub fn with_overrides(
        defaults: BreakerConfig,
        overrides: HashMap<String, BreakerConfig>,
    ) -> Result<Self> {
        defaults.validate()?;
        for (name, config) in &overrides {
            config.validate().map_err(|e| {
                breakwater_core::Error::config(format!("breaker '{name}': {e}"))
            })?;
        }

        Ok(Self {
            defaults,
            overrides: Arc::new(overrides),
            clock: Arc::new(MonotonicClock),
            listeners: Arc::new(Vec::new()),
            breakers: Arc::new(DashMap::new()),
        })
    }

    /// Use a specific clock for breakers created from now on
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach a listener to breakers created from now on
    pub fn with_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        Arc::make_mut(&mut self.listeners).push(listener);
        self
    }

    /// Configuration a breaker with this name gets
    pub fn config_for(&self, name: &str) -> &BreakerConfig {
        self.overrides.get(name).unwrap_or(&self.defaults)
    }

    /// Get or create the breaker for a dependency
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }

        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(breaker = %name, "Creating circuit breaker");
                Arc::new(CircuitBreaker::from_parts(
                    name.to_string(),
                    self.config_for(name).clone(),
                    self.clock.clone(),
                    self.listeners.as_ref().clone(),
                ))
            })
            .clone()
    }

    /// Get an existing breaker
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|entry| entry.clone())
    }

    /// State of a breaker; unknown names have never failed, so they are closed
    pub fn state(&self, name: &str) -> CircuitState {
        self.breakers
            .get(name)
            .map(|breaker| breaker.current_state())
            .unwrap_or(CircuitState::Closed)
    }

    /// Names of all breakers created so far, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Current state of every breaker
    pub fn states(&self) -> Vec<(String, CircuitState)> {
        let mut states: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().current_state()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    /// Metrics for every breaker
    pub fn all_metrics(&self) -> Vec<(String, BreakerMetrics)> {
        let mut metrics: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().metrics()))
            .collect();
        metrics.sort_by(|a, b| a.0.cmp(&b.0));
        metrics
    }

    /// Reset every breaker to closed
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
        info!(count = self.breakers.len(), "All circuit breakers reset");
    }

    /// Move every open breaker whose timeout has elapsed to half-open.
    ///
    /// Returns how many breakers are still open.
    pub fn check_all_timeouts(&self) -> usize {
        // Collect first so no shard lock is held while breakers emit events
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|e| e.value().clone()).collect();

        breakers
            .iter()
            .filter(|breaker| breaker.check_timeout().is_some())
            .count()
    }

    /// Start a background task that checks timeouts every `interval`
    pub fn start_timeout_task(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let still_open = self.check_all_timeouts();
                if still_open > 0 {
                    debug!(still_open, "Checked circuit breaker timeouts");
                }
            }
        })
    }
}
