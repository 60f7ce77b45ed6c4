//! # Error Handling for the Build & Observability Backplane
//!
//! All errors raised by the backplane crates are variants of [`CoreError`],
//! which provides detailed context for the failure modes shared across the
//! per-build orchestrator, the event pipeline, the alert evaluator, and the
//! session aggregator. Crate-specific error enums (in `backplane-build`,
//! `backplane-events`, `backplane-deploy`, ...) wrap a `CoreError` via
//! `#[from]` for the concerns that belong here (storage, alarms,
//! configuration, generic transport) and add their own variants for
//! concerns that don't.

use thiserror::Error;

/// The error type shared by every backplane crate for storage, alarm,
/// configuration, and generic transport failures.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A durable-storage read or write failed.
    ///
    /// Surfaced by the `Durable` trait implementations; callers that can
    /// retry (e.g. an `append` that failed to persist) are expected to do
    /// so rather than have this crate retry internally, per spec §4.A's
    /// failure semantics.
    #[error("storage error: {message}")]
    StorageError {
        /// Details about the storage operation failure.
        message: String,
    },

    /// A persisted entry could not be decoded.
    ///
    /// Corrupted entries are skipped best-effort by callers (spec §7); this
    /// variant exists so a caller can distinguish "not found" from
    /// "found but unreadable" when deciding whether to skip or propagate.
    #[error("corrupted entry at key {key}: {message}")]
    CorruptedEntry {
        /// Storage key of the corrupted entry.
        key: String,
        /// Details about the decode failure.
        message: String,
    },

    /// Required configuration is missing or malformed.
    #[error("configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    /// A JSON value failed to serialize or deserialize.
    #[error("serialization error: {message}")]
    SerializationError {
        /// Details about the (de)serialization failure.
        message: String,
    },

    /// An outbound HTTP call failed at the transport level (not a non-2xx
    /// response, which callers model as their own domain error so they can
    /// decide retryability per status code).
    #[error("transport error calling {endpoint}: {message}")]
    TransportError {
        /// The endpoint being called when the transport failed.
        endpoint: String,
        /// Details about the transport failure.
        message: String,
    },

    /// A value failed input validation at a system boundary.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Generic internal error for states that should be unreachable.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(error: serde_json::Error) -> Self {
        CoreError::SerializationError {
            message: error.to_string(),
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(error: reqwest::Error) -> Self {
        CoreError::TransportError {
            endpoint: error
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            message: error.to_string(),
        }
    }
}

/// Result alias used throughout `backplane-core`.
pub type Result<T> = std::result::Result<T, CoreError>;
