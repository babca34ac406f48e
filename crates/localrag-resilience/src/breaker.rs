use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use localrag_core::config::DependencySettings;
use localrag_core::{Error, Result};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive dependency failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a trial call.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(60) }
    }
}

impl From<&DependencySettings> for BreakerConfig {
    fn from(s: &DependencySettings) -> Self {
        Self { failure_threshold: s.failure_threshold.max(1), reset_timeout: s.reset_timeout() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Circuit breaker for one named dependency.
///
/// Every state transition happens under one lock, so concurrent callers
/// observe a single consistent sequence: at most one trial call is ever
/// admitted per half-open period.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn config(&self) -> BreakerConfig { self.config }

    /// Current state. An open circuit whose reset timeout has elapsed
    /// reports `HalfOpen`: the next call will be admitted as the trial.
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock();
        self.effective_state(&inner)
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: self.effective_state(&inner),
            consecutive_failures: inner.consecutive_failures,
            failure_threshold: self.config.failure_threshold,
        }
    }

    fn effective_state(&self, inner: &Inner) -> CircuitState {
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(at)) if at.elapsed() >= self.config.reset_timeout => CircuitState::HalfOpen,
            (state, _) => state,
        }
    }

    /// Operator override: close the circuit and forget past failures.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        *inner = Inner { state: CircuitState::Closed, consecutive_failures: 0, opened_at: None, trial_in_flight: false };
        info!(breaker = %self.name, "circuit reset");
    }

    /// Ask to make one call. Fails fast with [`Error::CircuitOpen`]
    /// while the circuit is open, or half-open with its trial taken.
    pub fn try_acquire(&self) -> Result<Permit<'_>> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(Permit::new(self, false)),
            CircuitState::Open => {
                let elapsed = inner.opened_at.is_some_and(|at| at.elapsed() >= self.config.reset_timeout);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    info!(breaker = %self.name, "circuit half-open, admitting trial call");
                    Ok(Permit::new(self, true))
                } else {
                    Err(self.open_error())
                }
            }
            CircuitState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                Ok(Permit::new(self, true))
            }
            CircuitState::HalfOpen => Err(self.open_error()),
        }
    }

    /// Run `op` through the breaker.
    pub async fn call<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let permit = self.try_acquire()?;
        let outcome = op().await;
        permit.record(&outcome);
        outcome
    }

    fn open_error(&self) -> Error {
        debug!(breaker = %self.name, "rejecting call, circuit open");
        Error::CircuitOpen { name: self.name.clone() }
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        if trial {
            inner.trial_in_flight = false;
            inner.state = CircuitState::Closed;
            inner.consecutive_failures = 0;
            inner.opened_at = None;
            info!(breaker = %self.name, "trial call succeeded, circuit closed");
        } else if inner.state == CircuitState::Closed {
            inner.consecutive_failures = 0;
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        if trial {
            inner.trial_in_flight = false;
            self.trip(&mut inner);
        } else if inner.state == CircuitState::Closed && inner.consecutive_failures >= self.config.failure_threshold {
            self.trip(&mut inner);
        }
    }

    fn trip(&self, inner: &mut Inner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        warn!(
            breaker = %self.name,
            failures = inner.consecutive_failures,
            reset_after = ?self.config.reset_timeout,
            "circuit opened"
        );
    }
}

/// Admission to make one call through a [`CircuitBreaker`].
///
/// The outcome must be reported with [`Permit::record`]. A trial permit
/// dropped without a report (the call was cancelled) counts as a failed
/// trial and reopens the circuit.
#[must_use = "report the call outcome with Permit::record"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    reported: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self { breaker, trial, reported: false }
    }

    pub fn is_trial(&self) -> bool { self.trial }

    /// Report the outcome. Errors that say nothing about the
    /// dependency's health count as successes.
    pub fn record<T>(mut self, outcome: &Result<T>) {
        self.reported = true;
        match outcome {
            Err(e) if e.is_dependency_failure() => self.breaker.on_failure(self.trial),
            _ => self.breaker.on_success(self.trial),
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.reported && self.trial {
            warn!(breaker = %self.breaker.name, "trial call abandoned");
            self.breaker.on_failure(true);
        }
    }
}

/// Breakers shared by dependency name.
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new() -> Self { Self::default() }

    /// The breaker registered under `name`, created with `config` on first
    /// use. Later calls return the same breaker regardless of `config`.
    pub fn get_or_create(&self, name: &str, config: BreakerConfig) -> Arc<CircuitBreaker> {
        self.breakers
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, config)))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.lock().get(name).cloned()
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut out: Vec<BreakerSnapshot> = self.breakers.lock().values().map(|b| b.snapshot()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn reset_all(&self) {
        for b in self.breakers.lock().values() { b.reset(); }
    }
}
