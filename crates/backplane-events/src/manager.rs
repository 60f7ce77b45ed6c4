//! Events Manager: the per-build actor owning both the Event Store and
//! Webhook Delivery (spec §2 data flow, §5 "Singleton-per-key actors").

use crate::delivery::WebhookDelivery;
use crate::error::Result;
use crate::store::EventStore;
use crate::types::{Event, EventPayload};
use backplane_core::alarm::Alarm;
use backplane_core::config::EventsConfig;
use backplane_core::storage::Durable;
use std::sync::Arc;

pub struct EventsManager {
    store: EventStore,
    delivery: WebhookDelivery,
}

impl EventsManager {
    pub fn new(
        durable: Arc<dyn Durable>,
        alarm: Arc<dyn Alarm>,
        config: EventsConfig,
        build_id: impl Into<String>,
    ) -> Self {
        let build_id = build_id.into();
        Self {
            store: EventStore::new(durable.clone(), build_id.clone()),
            delivery: WebhookDelivery::new(durable, alarm, config, build_id),
        }
    }

    pub async fn load(&mut self) -> Result<()> {
        self.store.load().await?;
        self.delivery.initialize().await
    }

    pub async fn append(&mut self, payload: EventPayload) -> Result<Event> {
        let event = self.store.append(payload).await?;
        self.delivery.schedule_flush(&self.store).await?;
        Ok(event)
    }

    pub async fn append_log(&mut self, message: impl Into<String>) -> Result<Event> {
        self.append(EventPayload::Log {
            message: message.into(),
        })
        .await
    }

    pub async fn append_status_change(&mut self, status: impl Into<String>) -> Result<Event> {
        self.append(EventPayload::StatusChange {
            status: status.into(),
        })
        .await
    }

    pub fn events(&self) -> Vec<Event> {
        self.store.events()
    }

    /// Called by the alarm handler to drive one flush cycle.
    pub async fn on_alarm(&mut self) -> Result<()> {
        self.delivery.flush(&mut self.store).await
    }

    pub fn delivery_state(&self) -> crate::types::DeliveryState {
        self.delivery.delivery_state()
    }

    pub fn last_processed_id(&self) -> i64 {
        self.store.last_processed_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backplane_core::alarm::InProcessAlarm;
    use backplane_core::storage::MemoryDurable;

    fn default_config() -> EventsConfig {
        EventsConfig {
            batch_max_events: 50,
            batch_max_ms: 2_000,
            backoff_base_ms: 2_000,
            stop_after_attempts: 10,
            backend_events_url: String::new(),
            backend_events_token: String::new(),
        }
    }

    #[tokio::test]
    async fn append_schedules_a_flush_via_alarm() {
        let alarm = Arc::new(InProcessAlarm::new());
        let mut manager = EventsManager::new(
            Arc::new(MemoryDurable::new()),
            alarm.clone(),
            default_config(),
            "build-1",
        );
        manager.load().await.unwrap();
        manager.append_log("Build created and queued").await.unwrap();
        assert!(alarm.get().await.is_some());
    }

    #[tokio::test]
    async fn empty_backend_url_trivially_delivers_on_alarm() {
        let alarm = Arc::new(InProcessAlarm::new());
        let mut manager = EventsManager::new(
            Arc::new(MemoryDurable::new()),
            alarm,
            default_config(),
            "build-1",
        );
        manager.load().await.unwrap();
        manager.append_log("hello").await.unwrap();
        manager.on_alarm().await.unwrap();
        assert_eq!(manager.events().len(), 1);
    }
}
