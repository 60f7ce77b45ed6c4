//! Alert configuration and burn-rate data model (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which outbound channel a fired alert uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Evaluated and notified before `Ticket`, so its cooldown marker can
    /// suppress a lower-severity alert for the same dimension.
    Page,
    Ticket,
}

/// The kind of evaluation that tripped, used to namespace cooldown markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ErrorRate,
    Ttfb,
}

/// Error-rate alert configuration, per model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRateConfig {
    pub model: String,
    pub enabled: bool,
    pub error_rate_slo: f64,
    pub min_requests_per_window: u64,
    pub updated_at: DateTime<Utc>,
}

/// TTFB (time-to-first-byte) alert configuration, per model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtfbConfig {
    pub model: String,
    pub enabled: bool,
    pub ttfb_threshold_ms: u64,
    pub ttfb_slo: f64,
    pub min_requests_per_window: u64,
    pub updated_at: DateTime<Utc>,
}

/// A static (severity, long window, short window, threshold) tuple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurnRateWindow {
    pub severity: Severity,
    pub long_window_minutes: u32,
    pub short_window_minutes: u32,
    pub burn_rate: f64,
}

/// The canonical window set from spec §3.
pub const CANONICAL_WINDOWS: [BurnRateWindow; 3] = [
    BurnRateWindow {
        severity: Severity::Page,
        long_window_minutes: 5,
        short_window_minutes: 1,
        burn_rate: 14.4,
    },
    BurnRateWindow {
        severity: Severity::Page,
        long_window_minutes: 30,
        short_window_minutes: 3,
        burn_rate: 6.0,
    },
    BurnRateWindow {
        severity: Severity::Ticket,
        long_window_minutes: 360,
        short_window_minutes: 30,
        burn_rate: 1.0,
    },
];

/// Sort windows per spec §4.E: `page` before `ticket`; within a severity,
/// higher `burnRate` first.
pub fn sorted_windows(mut windows: Vec<BurnRateWindow>) -> Vec<BurnRateWindow> {
    windows.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then(b.burn_rate.partial_cmp(&a.burn_rate).unwrap())
    });
    windows
}

/// The (provider, model, client) triple burn rates are evaluated for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub provider: String,
    pub model: String,
    pub client: String,
}

/// One aggregated row returned by an analytics query for a given window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub dimension: Dimension,
    pub total_weight: f64,
    pub bad_weight: f64,
}
