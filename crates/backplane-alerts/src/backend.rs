//! Analytics query and cooldown-store collaborators.
//!
//! Both the analytics backend and the cooldown store are explicitly out of
//! scope as concrete technologies (spec §1); these traits are the interface
//! the evaluator depends on.

use crate::error::Result;
use crate::types::{AggregateRow, AlertType, ErrorRateConfig, Severity, TtfbConfig};
use async_trait::async_trait;
use std::time::Duration;

/// Source of enabled per-model alert configuration.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn error_rate_configs(&self) -> Result<Vec<ErrorRateConfig>>;
    async fn ttfb_configs(&self) -> Result<Vec<TtfbConfig>>;
}

/// Queries the analytics store for per-dimension aggregates over a window.
#[async_trait]
pub trait AnalyticsBackend: Send + Sync {
    /// Error-rate aggregates for a window, grouped by dimension.
    async fn query_error_rate(&self, window_minutes: u32) -> Result<Vec<AggregateRow>>;

    /// TTFB aggregates for a window at a specific threshold: `total_weight`
    /// is successful requests, `bad_weight` is the count whose TTFB
    /// exceeded `threshold_ms`.
    async fn query_ttfb(&self, window_minutes: u32, threshold_ms: u64) -> Result<Vec<AggregateRow>>;
}

/// Read-modify-write dedup store keyed by `(alert_type, severity, dimension)`.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    /// `true` if a live (unexpired) marker exists for this key.
    async fn exists(&self, alert_type: AlertType, severity: Severity, key: &str) -> Result<bool>;

    /// Record a marker for `ttl`.
    async fn set(
        &self,
        alert_type: AlertType,
        severity: Severity,
        key: &str,
        ttl: Duration,
    ) -> Result<()>;
}

/// Cooldown TTLs from spec §4.E.
pub const PAGE_COOLDOWN: Duration = Duration::from_secs(15 * 60);
pub const TICKET_COOLDOWN: Duration = Duration::from_secs(4 * 60 * 60);

pub fn cooldown_for(severity: Severity) -> Duration {
    match severity {
        Severity::Page => PAGE_COOLDOWN,
        Severity::Ticket => TICKET_COOLDOWN,
    }
}
