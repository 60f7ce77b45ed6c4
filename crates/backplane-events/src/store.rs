//! Bounded per-build ring buffer of events with delivery-aware trimming
//! (spec §4.A).

use crate::error::Result;
use crate::types::{Event, EventPayload};
use backplane_core::storage::{get_json_best_effort, put_json, Durable};
use std::collections::VecDeque;
use std::sync::Arc;

/// Soft cap on buffered events; may be temporarily exceeded if every
/// buffered event is still unprocessed (trim safety, spec §4.A).
pub const MAX_EVENTS: usize = 5_000;

/// Durable per-build ring buffer of [`Event`]s.
pub struct EventStore {
    durable: Arc<dyn Durable>,
    key_prefix: String,
    buffer: VecDeque<Event>,
    last_processed_id: i64,
    max_events: usize,
}

impl EventStore {
    pub fn new(durable: Arc<dyn Durable>, build_id: impl Into<String>) -> Self {
        Self {
            durable,
            key_prefix: build_id.into(),
            buffer: VecDeque::new(),
            last_processed_id: -1,
            max_events: MAX_EVENTS,
        }
    }

    #[cfg(test)]
    fn with_max_events(durable: Arc<dyn Durable>, build_id: impl Into<String>, max_events: usize) -> Self {
        let mut store = Self::new(durable, build_id);
        store.max_events = max_events;
        store
    }

    fn events_key(&self) -> String {
        format!("build/{}/events", self.key_prefix)
    }

    fn last_processed_id_key(&self) -> String {
        format!("build/{}/lastProcessedId", self.key_prefix)
    }

    /// Restore the buffer and `lastProcessedId` from durable storage.
    /// Corrupted persisted entries are skipped best-effort (spec §4.A).
    pub async fn load(&mut self) -> Result<()> {
        let events: Vec<Event> = get_json_best_effort(self.durable.as_ref(), &self.events_key())
            .await?
            .unwrap_or_default();
        self.buffer = events.into_iter().collect();

        self.last_processed_id =
            get_json_best_effort::<i64>(self.durable.as_ref(), &self.last_processed_id_key())
                .await?
                .unwrap_or(-1);
        Ok(())
    }

    async fn persist_buffer(&self) -> Result<()> {
        let events: Vec<&Event> = self.buffer.iter().collect();
        put_json(self.durable.as_ref(), &self.events_key(), &events).await?;
        Ok(())
    }

    async fn persist_last_processed_id(&self) -> Result<()> {
        put_json(
            self.durable.as_ref(),
            &self.last_processed_id_key(),
            &self.last_processed_id,
        )
        .await?;
        Ok(())
    }

    /// Append a new event, assigning the next id, trimming, then
    /// persisting. On a storage failure the in-memory append is rolled
    /// back so the caller can retry (spec §4.A failure semantics).
    pub async fn append(&mut self, payload: EventPayload) -> Result<Event> {
        let next_id = self.buffer.back().map(|e| e.id + 1).unwrap_or(0);
        let event = Event {
            id: next_id,
            ts: chrono::Utc::now(),
            payload,
        };
        self.buffer.push_back(event.clone());
        self.trim();

        if let Err(err) = self.persist_buffer().await {
            self.buffer.pop_back();
            return Err(err);
        }
        Ok(event)
    }

    /// Drop delivered events from the head while the buffer exceeds the
    /// soft cap, never crossing `lastProcessedId` (spec §4.A trim algorithm).
    fn trim(&mut self) {
        while self.buffer.len() > self.max_events {
            match self.buffer.front() {
                Some(head) if (head.id as i64) <= self.last_processed_id => {
                    self.buffer.pop_front();
                }
                _ => {
                    tracing::warn!(
                        build_id = %self.key_prefix,
                        buffered = self.buffer.len(),
                        "event buffer exceeds cap but all entries are unprocessed"
                    );
                    break;
                }
            }
        }
    }

    /// Full current buffer.
    pub fn events(&self) -> Vec<Event> {
        self.buffer.iter().cloned().collect()
    }

    /// Contiguous prefix of events with `id > lastProcessedId`, located by
    /// arithmetic on the first buffered id rather than a linear scan.
    pub fn unprocessed(&self, limit: Option<usize>) -> Vec<Event> {
        let Some(first) = self.buffer.front() else {
            return Vec::new();
        };
        let first_id = first.id as i64;
        let skip = if self.last_processed_id + 1 > first_id {
            (self.last_processed_id + 1 - first_id) as usize
        } else {
            0
        };
        let iter = self.buffer.iter().skip(skip).cloned();
        match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    pub fn first_unprocessed(&self) -> Option<Event> {
        self.unprocessed(Some(1)).into_iter().next()
    }

    pub fn last_processed_id(&self) -> i64 {
        self.last_processed_id
    }

    /// Persistently advance `lastProcessedId`.
    pub async fn set_last_processed_id(&mut self, id: i64) -> Result<()> {
        self.last_processed_id = id;
        self.persist_last_processed_id().await?;
        // Advancing the watermark may newly permit trimming.
        self.trim();
        self.persist_buffer().await
    }
}
