//! Failure handling for calls to unreliable dependencies.
//!
//! Three layers compose, outermost first: a per-dependency
//! [`CircuitBreaker`], a bounded exponential-backoff [`RetryPolicy`] and a
//! per-attempt [`timeout::bounded`]. [`Resilience`] wires them together.

pub mod breaker;
pub mod fallback;
pub mod retry;
pub mod shell;
pub mod timeout;

pub use breaker::{BreakerConfig, BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitState, Permit};
pub use fallback::with_fallback;
pub use retry::RetryPolicy;
pub use shell::Resilience;
