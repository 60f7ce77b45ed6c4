//! # Backplane Core
//!
//! Shared primitives for the build orchestrator & observability backplane:
//! the error taxonomy, retry/circuit-breaking utilities, configuration
//! loading, the [`storage::Durable`] persistence contract, the
//! [`alarm::Alarm`] scheduling capability, and admin bearer-token auth.
//!
//! Every other crate in the workspace (`backplane-events`, `backplane-build`,
//! `backplane-deploy`, `backplane-alerts`, `backplane-sessions`,
//! `backplane-api`) depends on this one; none of them depend on each other
//! except through the traits defined here.

pub mod alarm;
pub mod auth;
pub mod config;
pub mod error;
pub mod storage;

pub use error::{CoreError, Result};

/// Current version of backplane-core.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports for crates building on top of `backplane-core`.
pub mod prelude {
    pub use crate::alarm::{Alarm, InProcessAlarm};
    pub use crate::config::RootConfig;
    pub use crate::error::{CircuitBreaker, CircuitBreakerConfig, CoreError, Result, RetryPolicy};
    pub use crate::storage::{Durable, MemoryDurable};
    pub use async_trait::async_trait;
    pub use serde_json::{json, Value};
    pub use uuid::Uuid;
}
