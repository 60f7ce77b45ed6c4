//! SLO burn-rate alert evaluator (spec §4.E): multi-window, multi-severity
//! error-rate and TTFB evaluation with cooldown-based deduplication.

pub mod backend;
pub mod burn_rate;
pub mod error;
pub mod evaluator;
pub mod notify;
pub mod providers;
pub mod types;

pub use backend::{cooldown_for, AnalyticsBackend, ConfigSource, CooldownStore, PAGE_COOLDOWN, TICKET_COOLDOWN};
pub use burn_rate::{bad_fraction, compute_burn_rate};
pub use error::{AlertError, Result};
pub use evaluator::AlertEvaluator;
pub use notify::{BreachDetail, Notification, Notifier, WebhookNotifier};
pub use providers::{DurableCooldownStore, DurableConfigSource, HttpAnalyticsBackend};
pub use types::{
    AggregateRow, AlertType, BurnRateWindow, Dimension, ErrorRateConfig, Severity, TtfbConfig,
    CANONICAL_WINDOWS,
};
