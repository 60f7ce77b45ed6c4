//! Error taxonomy for the Session Metrics Aggregator (spec §4.F).

use backplane_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] CoreError),

    #[error("analytics emission failed: {0}")]
    Emission(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
