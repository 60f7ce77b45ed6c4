//! # Backplane Events
//!
//! The per-build Event Store (spec §4.A) and Webhook Delivery engine
//! (spec §4.B), combined under the [`manager::EventsManager`] actor that
//! the Build Orchestrator drives.

pub mod delivery;
pub mod error;
pub mod manager;
pub mod store;
pub mod types;

pub use error::{EventsError, Result};
pub use manager::EventsManager;
pub use store::{EventStore, MAX_EVENTS};
pub use types::{DeliveryState, Event, EventPayload, WebhookBatch};
