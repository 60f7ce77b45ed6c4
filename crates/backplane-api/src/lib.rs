//! # Backplane API
//!
//! HTTP ingress for the build orchestrator and observability backplane
//! (spec §6 "External interfaces"): the deploy/build routes, the analytics
//! ingest routes, bearer-token auth, rate limiting, and the Prometheus
//! `/metrics` endpoint sit here; the domain logic itself lives in
//! `backplane-build`, `backplane-deploy`, `backplane-events`,
//! `backplane-alerts`, and `backplane-sessions`.

pub mod api;
pub mod error;
pub mod ingest;
pub mod monitoring;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use ingest::AnalyticsIngestClient;
pub use state::AppState;

/// Current version of the API server.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
