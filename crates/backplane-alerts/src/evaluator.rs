//! Per-tick multi-window multi-burn-rate evaluation (spec §4.E).

use crate::backend::{cooldown_for, AnalyticsBackend, ConfigSource, CooldownStore};
use crate::burn_rate::{bad_fraction, compute_burn_rate};
use crate::error::{AlertError, Result};
use crate::notify::{BreachDetail, Notification, Notifier};
use crate::types::{
    AggregateRow, AlertType, BurnRateWindow, Dimension, ErrorRateConfig, Severity, TtfbConfig,
    CANONICAL_WINDOWS,
};
use std::collections::HashMap;
use std::sync::Arc;

pub struct AlertEvaluator {
    configs: Arc<dyn ConfigSource>,
    backend: Arc<dyn AnalyticsBackend>,
    cooldown: Arc<dyn CooldownStore>,
    notifier: Arc<dyn Notifier>,
    windows: Vec<BurnRateWindow>,
}

impl AlertEvaluator {
    pub fn new(
        configs: Arc<dyn ConfigSource>,
        backend: Arc<dyn AnalyticsBackend>,
        cooldown: Arc<dyn CooldownStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            configs,
            backend,
            cooldown,
            notifier,
            windows: crate::types::sorted_windows(CANONICAL_WINDOWS.to_vec()),
        }
    }

    /// Run one evaluation tick across every configured window.
    pub async fn tick(&self) -> Result<Vec<Notification>> {
        let error_rate_configs = self.configs.error_rate_configs().await?;
        let ttfb_configs = self.configs.ttfb_configs().await?;

        let error_rate_by_model: HashMap<&str, &ErrorRateConfig> = error_rate_configs
            .iter()
            .map(|c| (c.model.as_str(), c))
            .collect();
        let ttfb_by_model: HashMap<&str, &TtfbConfig> =
            ttfb_configs.iter().map(|c| (c.model.as_str(), c)).collect();

        let mut fired = Vec::new();
        let mut failures = Vec::new();

        for window in &self.windows {
            match self
                .evaluate_error_rate_window(*window, &error_rate_by_model)
                .await
            {
                Ok(mut n) => fired.append(&mut n),
                Err(e) => failures.push(e.to_string()),
            }
            match self.evaluate_ttfb_window(*window, &ttfb_by_model).await {
                Ok(mut n) => fired.append(&mut n),
                Err(e) => failures.push(e.to_string()),
            }
        }

        if !failures.is_empty() {
            return Err(AlertError::Aggregated(failures.len(), failures));
        }
        Ok(fired)
    }

    async fn evaluate_error_rate_window(
        &self,
        window: BurnRateWindow,
        configs: &HashMap<&str, &ErrorRateConfig>,
    ) -> Result<Vec<Notification>> {
        let long_rows = self.backend.query_error_rate(window.long_window_minutes).await?;

        let mut tripped: Vec<(&ErrorRateConfig, AggregateRow, f64)> = Vec::new();
        for row in long_rows {
            let Some(config) = configs.get(row.dimension.model.as_str()) else {
                continue;
            };
            if !config.enabled
                || row.total_weight <= 0.0
                || row.total_weight < config.min_requests_per_window as f64
            {
                continue;
            }
            let burn_long =
                compute_burn_rate(bad_fraction(row.total_weight, row.bad_weight), config.error_rate_slo);
            if burn_long < window.burn_rate {
                continue;
            }
            tripped.push((config, row, burn_long));
        }
        if tripped.is_empty() {
            return Ok(Vec::new());
        }

        let short_rows = self.backend.query_error_rate(window.short_window_minutes).await?;
        let short_by_dim: HashMap<&Dimension, &AggregateRow> =
            short_rows.iter().map(|r| (&r.dimension, r)).collect();

        let mut notifications = Vec::new();
        for (config, long_row, burn_long) in tripped {
            // Open question (spec §9): a short-window row absent for a
            // dimension present in the long window is treated as "skip".
            let Some(short_row) = short_by_dim.get(&long_row.dimension) else {
                continue;
            };
            if short_row.total_weight <= 0.0
                || short_row.total_weight < config.min_requests_per_window as f64
            {
                continue;
            }
            let burn_short = compute_burn_rate(
                bad_fraction(short_row.total_weight, short_row.bad_weight),
                config.error_rate_slo,
            );
            if burn_short < window.burn_rate {
                continue;
            }

            if self.is_suppressed(AlertType::ErrorRate, window.severity, &long_row.dimension).await? {
                continue;
            }

            self.record_marker(AlertType::ErrorRate, window.severity, &long_row.dimension)
                .await?;

            notifications.push(Notification {
                severity: window.severity,
                dimension: long_row.dimension.clone(),
                window,
                burn_rate: burn_long,
                request_count: long_row.total_weight,
                detail: BreachDetail::ErrorRate {
                    observed_rate: bad_fraction(long_row.total_weight, long_row.bad_weight),
                    slo: config.error_rate_slo,
                },
            });
        }

        for notification in &notifications {
            self.notifier.notify(notification).await?;
        }
        Ok(notifications)
    }

    async fn evaluate_ttfb_window(
        &self,
        window: BurnRateWindow,
        configs: &HashMap<&str, &TtfbConfig>,
    ) -> Result<Vec<Notification>> {
        let enabled: Vec<&&TtfbConfig> = configs.values().filter(|c| c.enabled).collect();
        if enabled.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_threshold: HashMap<u64, Vec<&TtfbConfig>> = HashMap::new();
        for config in enabled {
            by_threshold.entry(config.ttfb_threshold_ms).or_default().push(config);
        }

        let mut notifications = Vec::new();
        for (threshold_ms, models) in by_threshold {
            let config_by_model: HashMap<&str, &TtfbConfig> =
                models.iter().map(|c| (c.model.as_str(), *c)).collect();

            let long_rows = self
                .backend
                .query_ttfb(window.long_window_minutes, threshold_ms)
                .await?;

            let mut tripped = Vec::new();
            for row in long_rows {
                let Some(config) = config_by_model.get(row.dimension.model.as_str()) else {
                    continue;
                };
                if row.total_weight <= 0.0
                    || row.total_weight < config.min_requests_per_window as f64
                {
                    continue;
                }
                let burn_long =
                    compute_burn_rate(bad_fraction(row.total_weight, row.bad_weight), config.ttfb_slo);
                if burn_long < window.burn_rate {
                    continue;
                }
                tripped.push((*config, row, burn_long));
            }
            if tripped.is_empty() {
                continue;
            }

            let short_rows = self
                .backend
                .query_ttfb(window.short_window_minutes, threshold_ms)
                .await?;
            let short_by_dim: HashMap<&Dimension, &AggregateRow> =
                short_rows.iter().map(|r| (&r.dimension, r)).collect();

            for (config, long_row, burn_long) in tripped {
                let Some(short_row) = short_by_dim.get(&long_row.dimension) else {
                    continue;
                };
                if short_row.total_weight <= 0.0
                    || short_row.total_weight < config.min_requests_per_window as f64
                {
                    continue;
                }
                let burn_short = compute_burn_rate(
                    bad_fraction(short_row.total_weight, short_row.bad_weight),
                    config.ttfb_slo,
                );
                if burn_short < window.burn_rate {
                    continue;
                }

                if self
                    .is_suppressed(AlertType::Ttfb, window.severity, &long_row.dimension)
                    .await?
                {
                    continue;
                }
                self.record_marker(AlertType::Ttfb, window.severity, &long_row.dimension)
                    .await?;

                notifications.push(Notification {
                    severity: window.severity,
                    dimension: long_row.dimension.clone(),
                    window,
                    burn_rate: burn_long,
                    request_count: long_row.total_weight,
                    detail: BreachDetail::Ttfb {
                        fraction_exceeding: bad_fraction(long_row.total_weight, long_row.bad_weight),
                        budget: 1.0 - config.ttfb_slo,
                    },
                });
            }
        }

        for notification in &notifications {
            self.notifier.notify(notification).await?;
        }
        Ok(notifications)
    }

    fn marker_key(dimension: &Dimension) -> String {
        format!("{}:{}:{}", dimension.provider, dimension.model, dimension.client)
    }

    async fn is_suppressed(
        &self,
        alert_type: AlertType,
        severity: Severity,
        dimension: &Dimension,
    ) -> Result<bool> {
        let key = Self::marker_key(dimension);
        if self.cooldown.exists(alert_type, severity, &key).await? {
            return Ok(true);
        }
        if severity == Severity::Ticket
            && self.cooldown.exists(alert_type, Severity::Page, &key).await?
        {
            return Ok(true);
        }
        Ok(false)
    }

    async fn record_marker(
        &self,
        alert_type: AlertType,
        severity: Severity,
        dimension: &Dimension,
    ) -> Result<()> {
        let key = Self::marker_key(dimension);
        self.cooldown
            .set(alert_type, severity, &key, cooldown_for(severity))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notification as N;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FixedConfigs {
        error_rate: Vec<ErrorRateConfig>,
        ttfb: Vec<TtfbConfig>,
    }

    #[async_trait]
    impl ConfigSource for FixedConfigs {
        async fn error_rate_configs(&self) -> Result<Vec<ErrorRateConfig>> {
            Ok(self.error_rate.clone())
        }
        async fn ttfb_configs(&self) -> Result<Vec<TtfbConfig>> {
            Ok(self.ttfb.clone())
        }
    }

    struct FixedBackend {
        long: Vec<AggregateRow>,
        short: Vec<AggregateRow>,
    }

    #[async_trait]
    impl AnalyticsBackend for FixedBackend {
        async fn query_error_rate(&self, window_minutes: u32) -> Result<Vec<AggregateRow>> {
            Ok(if window_minutes >= 5 { self.long.clone() } else { self.short.clone() })
        }
        async fn query_ttfb(&self, _window_minutes: u32, _threshold_ms: u64) -> Result<Vec<AggregateRow>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct InMemoryCooldown {
        markers: Mutex<std::collections::HashSet<(AlertType, Severity, String)>>,
    }

    #[async_trait]
    impl CooldownStore for InMemoryCooldown {
        async fn exists(&self, alert_type: AlertType, severity: Severity, key: &str) -> Result<bool> {
            Ok(self.markers.lock().unwrap().contains(&(alert_type, severity, key.to_string())))
        }
        async fn set(&self, alert_type: AlertType, severity: Severity, key: &str, _ttl: Duration) -> Result<()> {
            self.markers.lock().unwrap().insert((alert_type, severity, key.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct CapturingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for CapturingNotifier {
        async fn notify(&self, notification: &N) -> Result<()> {
            self.sent.lock().unwrap().push(notification.render());
            Ok(())
        }
    }

    fn dim() -> Dimension {
        Dimension {
            provider: "anthropic".into(),
            model: "claude".into(),
            client: "cli".into(),
        }
    }

    fn error_rate_config() -> ErrorRateConfig {
        ErrorRateConfig {
            model: "claude".into(),
            enabled: true,
            error_rate_slo: 0.999,
            min_requests_per_window: 10,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn multiwindow_burn_rate_alert_fires_page() {
        let backend = Arc::new(FixedBackend {
            long: vec![AggregateRow { dimension: dim(), total_weight: 1000.0, bad_weight: 20.0 }],
            short: vec![AggregateRow { dimension: dim(), total_weight: 100.0, bad_weight: 3.0 }],
        });
        let cooldown = Arc::new(InMemoryCooldown::default());
        let notifier = Arc::new(CapturingNotifier::default());
        let evaluator = AlertEvaluator::new(
            Arc::new(FixedConfigs { error_rate: vec![error_rate_config()], ttfb: vec![] }),
            backend,
            cooldown,
            notifier.clone(),
        );

        let fired = evaluator.tick().await.unwrap();
        let page_alerts: Vec<_> = fired.iter().filter(|n| n.severity == Severity::Page).collect();
        assert_eq!(page_alerts.len(), 1);
        assert!((page_alerts[0].burn_rate - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn page_cooldown_suppresses_ticket_for_same_dimension() {
        let backend = Arc::new(FixedBackend {
            long: vec![AggregateRow { dimension: dim(), total_weight: 1000.0, bad_weight: 20.0 }],
            short: vec![AggregateRow { dimension: dim(), total_weight: 100.0, bad_weight: 3.0 }],
        });
        let cooldown = Arc::new(InMemoryCooldown::default());
        cooldown
            .set(AlertType::ErrorRate, Severity::Page, "anthropic:claude:cli", Duration::from_secs(900))
            .await
            .unwrap();
        let notifier = Arc::new(CapturingNotifier::default());
        let evaluator = AlertEvaluator::new(
            Arc::new(FixedConfigs { error_rate: vec![error_rate_config()], ttfb: vec![] }),
            backend,
            cooldown,
            notifier,
        );

        let fired = evaluator.tick().await.unwrap();
        // Page is suppressed by its own just-set marker; ticket dimension
        // numbers (1000/20, 100/3) also clear the ticket threshold of 1.0,
        // but the active page marker must suppress it too.
        assert!(fired.iter().all(|n| n.severity != Severity::Page));
        assert!(fired.iter().all(|n| n.severity != Severity::Ticket));
    }

    #[tokio::test]
    async fn second_tick_is_fully_deduplicated() {
        let backend = Arc::new(FixedBackend {
            long: vec![AggregateRow { dimension: dim(), total_weight: 1000.0, bad_weight: 20.0 }],
            short: vec![AggregateRow { dimension: dim(), total_weight: 100.0, bad_weight: 3.0 }],
        });
        let cooldown = Arc::new(InMemoryCooldown::default());
        let notifier = Arc::new(CapturingNotifier::default());
        let evaluator = AlertEvaluator::new(
            Arc::new(FixedConfigs { error_rate: vec![error_rate_config()], ttfb: vec![] }),
            backend,
            cooldown,
            notifier,
        );

        let first = evaluator.tick().await.unwrap();
        assert!(!first.is_empty());
        let second = evaluator.tick().await.unwrap();
        assert!(second.is_empty());
    }
}
