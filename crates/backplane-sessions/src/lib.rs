//! # Backplane Sessions
//!
//! The Session Metrics Aggregator (spec §4.F): a per-session stream-to-record
//! reducer with idempotent one-shot emission and an inactivity fallback.

pub mod aggregator;
pub mod batch;
pub mod canonical;
pub mod error;
pub mod sink;
pub mod types;

pub use aggregator::{SessionAggregator, INACTIVITY_TIMEOUT_MS, POST_CLOSE_DRAIN_MS};
pub use batch::{split_ingest_batch_for_do, SplitResult, MAX_INGEST_BATCH_BYTES, MAX_INGEST_ITEM_BYTES};
pub use canonical::canonical_json;
pub use error::{Result, SessionError};
pub use sink::SessionMetricsSink;
pub use types::{
    CloseReason, CompactionPart, Item, MessageRole, SessionMetrics, TokenUsage, ToolPart, ToolStatus,
};
