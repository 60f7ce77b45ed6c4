//! Error taxonomy for the Deployment Client.

use backplane_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Storage(#[from] CoreError),

    #[error("invalid worker name: {0}")]
    InvalidWorkerName(String),

    #[error("provider request failed: {0}")]
    Provider(String),

    /// Provider error with a numeric code, so migration-collision (10074) and
    /// script-not-found (10007) handling can match on it without re-parsing
    /// response bodies at every call site.
    #[error("provider error {code}: {message}")]
    ProviderCode { code: i64, message: String },

    #[error("asset upload session never produced a completion token")]
    NoCompletionToken,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider API circuit breaker is open")]
    CircuitOpen,
}

pub type Result<T> = std::result::Result<T, DeployError>;
