use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use localrag_core::config::DependencySettings;
use localrag_core::Result;

use crate::breaker::{BreakerConfig, BreakerRegistry, CircuitBreaker};
use crate::retry::RetryPolicy;
use crate::timeout::bounded;

/// Circuit breaker, then retry, then per-attempt timeout, for one
/// dependency. Cloning shares the breaker.
#[derive(Clone)]
pub struct Resilience {
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl Resilience {
    pub fn new(breaker: Arc<CircuitBreaker>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self { breaker, retry, timeout }
    }

    /// Build from settings, sharing the registry's breaker for `name`.
    pub fn from_settings(registry: &BreakerRegistry, name: &str, settings: &DependencySettings) -> Self {
        let breaker = registry.get_or_create(name, BreakerConfig::from(settings));
        Self::new(breaker, RetryPolicy::from(settings), settings.timeout())
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> { &self.breaker }
    pub fn retry_policy(&self) -> &RetryPolicy { &self.retry }

    /// Run `op` under all three layers. The breaker records a single
    /// outcome for the whole retried call; an open circuit rejects the
    /// call before `op` is ever invoked.
    pub async fn call<F, Fut, T>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let permit = self.breaker.try_acquire()?;
        let limit = self.timeout;
        let outcome = self.retry.run(|| bounded(limit, op())).await;
        permit.record(&outcome);
        outcome
    }
}
