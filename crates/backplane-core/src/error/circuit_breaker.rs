//! # Circuit Breaker Pattern Implementation
//!
//! Prevents cascade failures by temporarily blocking calls to a service that
//! has been failing. Used by `backplane-deploy` to wrap the provider API
//! client so a run of 5xx responses doesn't get hammered across every build
//! on the instance between the point it starts failing and the point
//! `RetryPolicy::provider_default` gives up on a single call.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation; calls pass through.
    Closed,
    /// Calls are blocked without attempting the underlying operation.
    Open,
    /// A limited number of calls are allowed through to probe recovery.
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failures within `window` before the circuit opens.
    pub failure_threshold: u32,
    /// Consecutive successes in `HalfOpen` before the circuit closes.
    pub success_threshold: u32,
    /// How long the circuit stays `Open` before probing with `HalfOpen`.
    pub timeout: Duration,
    /// Rolling window over which failures are counted while `Closed`.
    pub window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
            window: Duration::from_secs(60),
        }
    }
}

/// Error returned by [`CircuitBreaker::call`] when the circuit is open;
/// distinct from the wrapped operation's own error type `E`.
#[derive(Debug, thiserror::Error)]
pub enum CircuitError<E> {
    /// The circuit is open; the call was not attempted.
    #[error("circuit breaker is open")]
    Open,
    /// The underlying operation failed.
    #[error(transparent)]
    Inner(E),
}

/// A circuit breaker guarding an arbitrary fallible async operation.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    last_failure_time: Mutex<Option<Instant>>,
    state_changed_at: Mutex<Instant>,
    total_calls: AtomicU64,
    total_failures: AtomicU64,
    total_successes: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker in the `Closed` state.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            last_failure_time: Mutex::new(None),
            state_changed_at: Mutex::new(Instant::now()),
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_successes: AtomicU64::new(0),
        }
    }

    /// Current state, lazily transitioning `Open` to `HalfOpen` once the
    /// timeout has elapsed.
    pub async fn state(&self) -> CircuitState {
        let state = *self.state.read().await;
        if state == CircuitState::Open {
            let changed_at = *self.state_changed_at.lock().unwrap();
            if changed_at.elapsed() >= self.config.timeout {
                self.transition_to(CircuitState::HalfOpen).await;
                return CircuitState::HalfOpen;
            }
        }
        state
    }

    /// Execute `f` through the circuit breaker, recording the outcome.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        if self.state().await == CircuitState::Open {
            return Err(CircuitError::Open);
        }

        match f().await {
            Ok(result) => {
                self.on_success().await;
                Ok(result)
            }
            Err(error) => {
                self.on_failure().await;
                Err(CircuitError::Inner(error))
            }
        }
    }

    async fn on_success(&self) {
        self.total_successes.fetch_add(1, Ordering::Relaxed);
        match *self.state.read().await {
            CircuitState::HalfOpen => {
                let count = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= self.config.success_threshold {
                    self.transition_to(CircuitState::Closed).await;
                }
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::SeqCst);
            }
            CircuitState::Open => {}
        }
    }

    async fn on_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        match *self.state.read().await {
            CircuitState::HalfOpen => {
                self.transition_to(CircuitState::Open).await;
            }
            CircuitState::Closed => {
                let now = Instant::now();
                let should_increment = {
                    let mut last_failure = self.last_failure_time.lock().unwrap();
                    match *last_failure {
                        Some(last) if now.duration_since(last) > self.config.window => {
                            self.failure_count.store(1, Ordering::SeqCst);
                            *last_failure = Some(now);
                            false
                        }
                        Some(_) => true,
                        None => {
                            *last_failure = Some(now);
                            true
                        }
                    }
                };
                if should_increment {
                    let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                    if count >= self.config.failure_threshold {
                        self.transition_to(CircuitState::Open).await;
                    }
                }
            }
            CircuitState::Open => {}
        }
    }

    async fn transition_to(&self, new_state: CircuitState) {
        let mut state = self.state.write().await;
        let old_state = *state;
        if old_state == new_state {
            return;
        }
        *state = new_state;
        *self.state_changed_at.lock().unwrap() = Instant::now();
        match new_state {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::SeqCst);
                self.success_count.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => self.success_count.store(0, Ordering::SeqCst),
            CircuitState::Open => self.failure_count.store(0, Ordering::SeqCst),
        }
        tracing::info!(?old_state, ?new_state, "circuit breaker state changed");
    }

    /// Snapshot of call counters, for `/metrics` export.
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time circuit breaker counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_successes: u64,
}
