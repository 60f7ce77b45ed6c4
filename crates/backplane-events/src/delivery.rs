//! Batched, exponentially-backed-off webhook delivery with at-least-once
//! semantics (spec §4.B).

use crate::error::Result;
use crate::store::EventStore;
use crate::types::{DeliveryState, WebhookBatch};
use backplane_core::alarm::Alarm;
use backplane_core::config::EventsConfig;
use backplane_core::storage::{get_json, put_json, Durable};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Drains an [`EventStore`] to a single backend URL in batches.
pub struct WebhookDelivery {
    durable: Arc<dyn Durable>,
    alarm: Arc<dyn Alarm>,
    client: reqwest::Client,
    config: EventsConfig,
    build_id: String,
    state: DeliveryState,
    flushing: AtomicBool,
}

impl WebhookDelivery {
    pub fn new(
        durable: Arc<dyn Durable>,
        alarm: Arc<dyn Alarm>,
        config: EventsConfig,
        build_id: impl Into<String>,
    ) -> Self {
        Self {
            durable,
            alarm,
            client: reqwest::Client::new(),
            config,
            build_id: build_id.into(),
            state: DeliveryState::default(),
            flushing: AtomicBool::new(false),
        }
    }

    fn state_key(&self) -> String {
        format!("build/{}/deliveryState", self.build_id)
    }

    /// Load `DeliveryState`, defaulting to `{nextAttemptAt: 0, attempt: 0}`.
    pub async fn initialize(&mut self) -> Result<()> {
        self.state = get_json(self.durable.as_ref(), &self.state_key())
            .await?
            .unwrap_or_default();
        Ok(())
    }

    pub fn delivery_state(&self) -> DeliveryState {
        self.state
    }

    async fn persist_state(&self) -> Result<()> {
        put_json(self.durable.as_ref(), &self.state_key(), &self.state).await?;
        Ok(())
    }

    /// Decide when `flush()` should next run, called after every append.
    pub async fn schedule_flush(&self, store: &EventStore) -> Result<()> {
        let pending = store.unprocessed(Some(self.config.batch_max_events)).len();
        if pending == 0 {
            return Ok(());
        }

        if self.state.attempt > 0 {
            if self.state.attempt > self.config.stop_after_attempts {
                return Ok(());
            }
            self.alarm.set(to_datetime(self.state.next_attempt_at)).await;
            return Ok(());
        }

        if pending >= self.config.batch_max_events {
            self.alarm.set(to_datetime(now_ms() + 50)).await;
            return Ok(());
        }

        let target = now_ms() + self.config.batch_max_ms as i64;
        match self.alarm.get().await {
            Some(current) if current.timestamp_millis() <= target => {}
            _ => self.alarm.set(to_datetime(target)).await,
        }
        Ok(())
    }

    /// Perform one delivery attempt cycle (spec §4.B Flush procedure).
    pub async fn flush(&mut self, store: &mut EventStore) -> Result<()> {
        if self
            .flushing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }
        let result = self.flush_inner(store).await;
        self.flushing.store(false, Ordering::SeqCst);
        result
    }

    async fn flush_inner(&mut self, store: &mut EventStore) -> Result<()> {
        if self.state.attempt > self.config.stop_after_attempts {
            return Ok(());
        }

        let events = store.unprocessed(Some(self.config.batch_max_events));
        if events.is_empty() {
            return Ok(());
        }

        let delivered = if self.config.backend_events_url.is_empty() {
            true
        } else {
            let batch = WebhookBatch {
                build_id: &self.build_id,
                events: &events,
            };
            match self
                .client
                .post(&self.config.backend_events_url)
                .bearer_auth(&self.config.backend_events_token)
                .json(&batch)
                .send()
                .await
            {
                Ok(response) => response.status().is_success(),
                Err(_) => false,
            }
        };

        if delivered {
            let last_id = events.last().unwrap().id as i64;
            store.set_last_processed_id(last_id).await?;
            self.state.attempt = 0;
            self.state.next_attempt_at = 0;
        } else {
            self.state.attempt += 1;
            let backoff =
                self.config.backoff_base_ms * 2u64.pow(self.state.attempt.saturating_sub(1));
            self.state.next_attempt_at = now_ms() + backoff as i64;
        }

        self.persist_state().await?;
        self.schedule_flush(store).await
    }
}

fn to_datetime(epoch_ms: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp_millis(epoch_ms).unwrap_or_else(chrono::Utc::now)
}
