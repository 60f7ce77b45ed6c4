//! # Error Handling Framework
//!
//! Shared error types plus the two cross-cutting resilience primitives every
//! outbound call in the backplane needs: retry with exponential backoff, and
//! a circuit breaker to stop hammering a provider that is already down.

pub mod circuit_breaker;
pub mod retry;
pub mod types;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use types::{CoreError, Result};
