//! Error taxonomy for the SLO alert evaluator.

use backplane_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlertError {
    #[error(transparent)]
    Storage(#[from] CoreError),

    #[error("analytics query failed: {0}")]
    AnalyticsQuery(String),

    #[error("notification delivery failed: {0}")]
    Notification(String),

    /// Per-window evaluation errors accumulated across a tick and reported
    /// together at the end (spec §4.E "Per tick" step 3).
    #[error("{0} window(s) failed during this tick: {1:?}")]
    Aggregated(usize, Vec<String>),
}

pub type Result<T> = std::result::Result<T, AlertError>;
