//! Durable storage abstraction
//!
//! The datastore backing the orchestrator, event store, and session
//! aggregator is explicitly out of scope as a concrete technology (spec §1),
//! but every component needs namespaced get/put/delete that survives an
//! actor restart. [`Durable`] is that contract, grounded in the teacher's
//! `EventStore` trait (`db/events/store.rs`): callers depend on the trait,
//! never on a concrete backend, so a real one (Postgres via `diesel`, or an
//! edge key-value store) can be dropped in without touching component logic.

use crate::error::CoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Namespaced durable key/value storage with list-by-prefix.
#[async_trait]
pub trait Durable: Send + Sync {
    /// Fetch the raw bytes at `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;

    /// Store `value` at `key`, overwriting any prior value.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), CoreError>;

    /// Remove `key`, if present. Not an error if it was already absent.
    async fn delete(&self, key: &str) -> Result<(), CoreError>;

    /// List all keys with the given prefix, in lexicographic order.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, CoreError>;
}

/// In-memory [`Durable`] implementation, the default backing store and the
/// one every crate's tests run against.
#[derive(Default)]
pub struct MemoryDurable {
    data: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryDurable {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Durable for MemoryDurable {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), CoreError> {
        self.data.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CoreError> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, CoreError> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

/// Serialize `value` to JSON and [`Durable::put`] it at `key`.
pub async fn put_json<T: serde::Serialize + Sync>(
    durable: &dyn Durable,
    key: &str,
    value: &T,
) -> Result<(), CoreError> {
    let bytes = serde_json::to_vec(value)?;
    durable.put(key, bytes).await
}

/// [`Durable::get`] at `key` and deserialize as JSON, if present.
pub async fn get_json<T: serde::de::DeserializeOwned>(
    durable: &dyn Durable,
    key: &str,
) -> Result<Option<T>, CoreError> {
    match durable.get(key).await? {
        Some(bytes) => {
            let value = serde_json::from_slice(&bytes).map_err(|e| CoreError::CorruptedEntry {
                key: key.to_string(),
                message: e.to_string(),
            })?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Like [`get_json`], but a corrupted entry is treated as absent rather than
/// propagated, per spec §7's "skipped best-effort; never fatal" rule for
/// restoring actor state. A warning is logged so the corruption isn't silent.
/// Other storage failures (the backend itself erroring) still propagate.
pub async fn get_json_best_effort<T: serde::de::DeserializeOwned>(
    durable: &dyn Durable,
    key: &str,
) -> Result<Option<T>, CoreError> {
    match get_json(durable, key).await {
        Ok(value) => Ok(value),
        Err(CoreError::CorruptedEntry { key, message }) => {
            tracing::warn!(key = %key, error = %message, "skipping corrupted durable entry");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        n: u32,
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = MemoryDurable::new();
        put_json(&store, "a/1", &Sample { n: 1 }).await.unwrap();
        let got: Option<Sample> = get_json(&store, "a/1").await.unwrap();
        assert_eq!(got, Some(Sample { n: 1 }));

        store.delete("a/1").await.unwrap();
        let got: Option<Sample> = get_json(&store, "a/1").await.unwrap();
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn list_prefix_orders_lexicographically() {
        let store = MemoryDurable::new();
        store.put("events/3", vec![]).await.unwrap();
        store.put("events/1", vec![]).await.unwrap();
        store.put("events/2", vec![]).await.unwrap();
        store.put("other/1", vec![]).await.unwrap();

        let keys = store.list_prefix("events/").await.unwrap();
        assert_eq!(keys, vec!["events/1", "events/2", "events/3"]);
    }

    #[tokio::test]
    async fn corrupted_entry_surfaces_distinctly() {
        let store = MemoryDurable::new();
        store.put("bad", b"not json".to_vec()).await.unwrap();
        let result: Result<Option<Sample>, CoreError> = get_json(&store, "bad").await;
        assert!(matches!(result, Err(CoreError::CorruptedEntry { .. })));
    }

    #[tokio::test]
    async fn best_effort_treats_corrupted_entry_as_absent() {
        let store = MemoryDurable::new();
        store.put("bad", b"not json".to_vec()).await.unwrap();
        let result: Option<Sample> = get_json_best_effort(&store, "bad").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn best_effort_still_returns_valid_entries() {
        let store = MemoryDurable::new();
        put_json(&store, "a/1", &Sample { n: 1 }).await.unwrap();
        let result: Option<Sample> = get_json_best_effort(&store, "a/1").await.unwrap();
        assert_eq!(result, Some(Sample { n: 1 }));
    }
}
