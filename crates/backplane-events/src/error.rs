//! Error taxonomy for the event pipeline.

use backplane_core::CoreError;
use thiserror::Error;

/// Errors raised by the Event Store and Webhook Delivery.
#[derive(Error, Debug)]
pub enum EventsError {
    /// A durable-storage operation failed.
    #[error(transparent)]
    Storage(#[from] CoreError),

    /// The build this store/delivery instance is scoped to was not found.
    #[error("build not found: {0}")]
    BuildNotFound(String),
}

pub type Result<T> = std::result::Result<T, EventsError>;
