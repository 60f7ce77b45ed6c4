//! Concrete collaborators for the evaluator's three out-of-process seams:
//! an HTTP-backed analytics query client (the analytics store itself is out
//! of scope per spec §1, same HTTP-client shape as
//! `backplane-deploy::DeploymentClient`), and `Durable`-backed cooldown
//! markers and per-model config, since those are this service's own state,
//! not shared external systems.

use crate::backend::{AnalyticsBackend, ConfigSource, CooldownStore};
use crate::error::{AlertError, Result};
use crate::types::{AggregateRow, AlertType, ErrorRateConfig, Severity, TtfbConfig};
use async_trait::async_trait;
use backplane_core::storage::{get_json, put_json, Durable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Queries the configured analytics endpoint for per-window aggregates.
pub struct HttpAnalyticsBackend {
    client: reqwest::Client,
    query_url: String,
}

impl HttpAnalyticsBackend {
    pub fn new(query_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client builds"),
            query_url,
        }
    }
}

#[async_trait]
impl AnalyticsBackend for HttpAnalyticsBackend {
    async fn query_error_rate(&self, window_minutes: u32) -> Result<Vec<AggregateRow>> {
        let body = serde_json::json!({ "metric": "error_rate", "window_minutes": window_minutes });
        self.run_query(&body).await
    }

    async fn query_ttfb(&self, window_minutes: u32, threshold_ms: u64) -> Result<Vec<AggregateRow>> {
        let body = serde_json::json!({
            "metric": "ttfb",
            "window_minutes": window_minutes,
            "threshold_ms": threshold_ms,
        });
        self.run_query(&body).await
    }
}

impl HttpAnalyticsBackend {
    async fn run_query(&self, body: &serde_json::Value) -> Result<Vec<AggregateRow>> {
        let response = self
            .client
            .post(&self.query_url)
            .json(body)
            .send()
            .await
            .map_err(|e| AlertError::AnalyticsQuery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AlertError::AnalyticsQuery(format!(
                "analytics query returned {}",
                response.status()
            )));
        }
        response
            .json::<Vec<AggregateRow>>()
            .await
            .map_err(|e| AlertError::AnalyticsQuery(e.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CooldownMarker {
    expires_at: DateTime<Utc>,
}

fn cooldown_key(alert_type: AlertType, severity: Severity, key: &str) -> String {
    format!(
        "alert/cooldown/{:?}/{:?}/{}",
        alert_type, severity, key
    )
}

/// `CooldownStore` backed by `Durable`, expiring markers by wall-clock
/// comparison rather than a backend-native TTL.
pub struct DurableCooldownStore {
    durable: Arc<dyn Durable>,
}

impl DurableCooldownStore {
    pub fn new(durable: Arc<dyn Durable>) -> Self {
        Self { durable }
    }
}

#[async_trait]
impl CooldownStore for DurableCooldownStore {
    async fn exists(&self, alert_type: AlertType, severity: Severity, key: &str) -> Result<bool> {
        let storage_key = cooldown_key(alert_type, severity, key);
        let marker: Option<CooldownMarker> = get_json(self.durable.as_ref(), &storage_key).await?;
        Ok(marker.map(|m| m.expires_at > Utc::now()).unwrap_or(false))
    }

    async fn set(&self, alert_type: AlertType, severity: Severity, key: &str, ttl: Duration) -> Result<()> {
        let storage_key = cooldown_key(alert_type, severity, key);
        let marker = CooldownMarker {
            expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
        };
        put_json(self.durable.as_ref(), &storage_key, &marker).await?;
        Ok(())
    }
}

const ERROR_RATE_CONFIGS_KEY: &str = "alert/config/error_rate";
const TTFB_CONFIGS_KEY: &str = "alert/config/ttfb";

/// `ConfigSource` backed by `Durable`: operators write the per-model SLO
/// configuration list directly into storage (there is no admin UI in
/// scope), read fresh on every tick.
pub struct DurableConfigSource {
    durable: Arc<dyn Durable>,
}

impl DurableConfigSource {
    pub fn new(durable: Arc<dyn Durable>) -> Self {
        Self { durable }
    }
}

#[async_trait]
impl ConfigSource for DurableConfigSource {
    async fn error_rate_configs(&self) -> Result<Vec<ErrorRateConfig>> {
        Ok(get_json(self.durable.as_ref(), ERROR_RATE_CONFIGS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn ttfb_configs(&self) -> Result<Vec<TtfbConfig>> {
        Ok(get_json(self.durable.as_ref(), TTFB_CONFIGS_KEY).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backplane_core::storage::MemoryDurable;

    #[tokio::test]
    async fn cooldown_marker_expires_after_ttl() {
        let durable = Arc::new(MemoryDurable::new());
        let store = DurableCooldownStore::new(durable);
        store
            .set(AlertType::ErrorRate, Severity::Page, "anthropic:claude:cli", Duration::from_millis(10))
            .await
            .unwrap();
        assert!(store.exists(AlertType::ErrorRate, Severity::Page, "anthropic:claude:cli").await.unwrap());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!store.exists(AlertType::ErrorRate, Severity::Page, "anthropic:claude:cli").await.unwrap());
    }

    #[tokio::test]
    async fn config_source_defaults_to_empty_when_unset() {
        let durable = Arc::new(MemoryDurable::new());
        let source = DurableConfigSource::new(durable);
        assert!(source.error_rate_configs().await.unwrap().is_empty());
        assert!(source.ttfb_configs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn config_source_reads_back_what_was_written() {
        let durable = Arc::new(MemoryDurable::new());
        put_json(
            durable.as_ref(),
            ERROR_RATE_CONFIGS_KEY,
            &vec![ErrorRateConfig {
                model: "claude".into(),
                enabled: true,
                error_rate_slo: 0.999,
                min_requests_per_window: 10,
                updated_at: Utc::now(),
            }],
        )
        .await
        .unwrap();

        let source = DurableConfigSource::new(durable);
        let configs = source.error_rate_configs().await.unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].model, "claude");
    }
}
