//! Configuration management for the build & observability backplane
//!
//! Each concern loads itself from the environment via `*Config::from_env()`,
//! mirroring the teacher's per-domain config modules; [`RootConfig`]
//! aggregates all of them for the app binary to load once at startup.

pub mod env_utils;
pub mod error;
pub mod validation;

pub use error::{ConfigError, ConfigResult};

use env_utils::EnvLoader;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the Event Store + Webhook Delivery pipeline (spec §4.A/B).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Max events buffered per batch before a flush is forced.
    pub batch_max_events: usize,
    /// Max time a batch may sit unflushed before it is forced out.
    pub batch_max_ms: u64,
    /// Base delay for the webhook delivery backoff schedule.
    pub backoff_base_ms: u64,
    /// Consecutive failed flush attempts before delivery is abandoned.
    pub stop_after_attempts: u32,
    /// Backend ingestion URL events are ultimately forwarded to.
    pub backend_events_url: String,
    /// Bearer token presented to `backend_events_url`.
    pub backend_events_token: String,
}

impl EventsConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            batch_max_events: EnvLoader::load_with_default("BATCH_MAX_EVENTS", 50usize)?,
            batch_max_ms: EnvLoader::load_with_default("BATCH_MAX_MS", 5_000u64)?,
            backoff_base_ms: EnvLoader::load_with_default("BACKOFF_BASE_MS", 1_000u64)?,
            stop_after_attempts: EnvLoader::load_with_default("STOP_AFTER_ATTEMPTS", 6u32)?,
            backend_events_url: EnvLoader::load_required("BACKEND_EVENTS_URL")?,
            backend_events_token: EnvLoader::load_with_default(
                "BACKEND_EVENTS_TOKEN",
                String::new(),
            )?,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty_string(&self.backend_events_url, "backend_events_url")?;
        validation::validate_url(&self.backend_events_url, "backend_events_url")?;
        validation::validate_range(self.batch_max_events, 1, 10_000, "batch_max_events")?;
        validation::validate_range(self.stop_after_attempts, 1, 100, "stop_after_attempts")?;
        Ok(())
    }
}

/// HTTP ingress configuration (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token admin clients must present on every request.
    pub auth_token: String,
    pub rate_limit_per_minute: u32,
    pub rate_limit_burst: u32,
    /// Ingestion endpoint for `POST /ingest/api-metrics` and session-metrics
    /// emission (spec §6 "Observability ingress"); the analytics store
    /// itself is out of scope as a concrete technology, same as
    /// `AlertConfig.analytics_query_url` on the query side.
    pub analytics_ingest_url: String,
}

impl ApiConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            host: EnvLoader::load_with_default("HOST", "127.0.0.1".to_string())?,
            port: EnvLoader::load_with_default("PORT", 8080u16)?,
            auth_token: EnvLoader::load_required("AUTH_TOKEN")?,
            rate_limit_per_minute: EnvLoader::load_with_default("RATE_LIMIT_PER_MINUTE", 60u32)?,
            rate_limit_burst: EnvLoader::load_with_default("RATE_LIMIT_BURST", 10u32)?,
            analytics_ingest_url: EnvLoader::load_required("ANALYTICS_INGEST_URL")?,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.auth_token.len() < 16 {
            return Err(ConfigError::ValidationFailed(
                "AUTH_TOKEN must be at least 16 characters long".to_string(),
            ));
        }
        validation::validate_range(self.port as u32, 1, 65535, "port")?;
        validation::validate_url(&self.analytics_ingest_url, "analytics_ingest_url")?;
        Ok(())
    }
}

/// Build provider API configuration (spec §4.D).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub account_id: String,
    pub api_token: String,
}

impl ProviderConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            base_url: EnvLoader::load_with_default(
                "PROVIDER_BASE_URL",
                "https://api.provider.example.com".to_string(),
            )?,
            account_id: EnvLoader::load_required("PROVIDER_ACCOUNT_ID")?,
            api_token: EnvLoader::load_required("PROVIDER_API_TOKEN")?,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        validation::validate_url(&self.base_url, "provider_base_url")?;
        validation::validate_non_empty_string(&self.account_id, "provider_account_id")?;
        validation::validate_non_empty_string(&self.api_token, "provider_api_token")?;
        Ok(())
    }
}

/// SLO Alert Evaluator configuration (spec §4.E).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Minimum time between repeated notifications for the same rule+window.
    pub cooldown_seconds: u64,
    pub ticket_webhook_url: Option<String>,
    pub page_webhook_url: Option<String>,
    /// Analytics store query endpoint the evaluator polls each tick. The
    /// analytics store itself is out of scope as a concrete technology
    /// (spec §1 Non-goals); this is only the HTTP seam to reach whatever
    /// backend is configured, the same shape as `ProviderConfig.base_url`.
    pub analytics_query_url: String,
    pub tick_interval_seconds: u64,
}

impl AlertConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            cooldown_seconds: EnvLoader::load_with_default("ALERT_COOLDOWN_SECONDS", 1_800u64)?,
            ticket_webhook_url: EnvLoader::load_optional("ALERT_TICKET_WEBHOOK_URL")?,
            page_webhook_url: EnvLoader::load_optional("ALERT_PAGE_WEBHOOK_URL")?,
            analytics_query_url: EnvLoader::load_required("ANALYTICS_QUERY_URL")?,
            tick_interval_seconds: EnvLoader::load_with_default("ALERT_TICK_INTERVAL_SECONDS", 60u64)?,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(url) = &self.ticket_webhook_url {
            validation::validate_url(url, "alert_ticket_webhook_url")?;
        }
        if let Some(url) = &self.page_webhook_url {
            validation::validate_url(url, "alert_page_webhook_url")?;
        }
        validation::validate_url(&self.analytics_query_url, "analytics_query_url")?;
        validation::validate_range(self.tick_interval_seconds, 1, 86_400, "tick_interval_seconds")?;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

/// Logging/observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub prometheus_enabled: bool,
    pub prometheus_port: u16,
    pub log_level: String,
}

impl MonitoringConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            prometheus_enabled: EnvLoader::load_bool("PROMETHEUS_ENABLED", true),
            prometheus_port: EnvLoader::load_with_default("PROMETHEUS_PORT", 9090u16)?,
            log_level: EnvLoader::load_with_default("LOG_LEVEL", "info".to_string())?,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "invalid log level: {}. must be one of: {}",
                self.log_level,
                valid_log_levels.join(", ")
            )));
        }
        Ok(())
    }
}

/// Aggregate configuration for the whole backplane, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    pub events: EventsConfig,
    pub api: ApiConfig,
    pub provider: ProviderConfig,
    pub alerts: AlertConfig,
    pub monitoring: MonitoringConfig,
}

impl RootConfig {
    pub fn from_env() -> ConfigResult<Self> {
        let config = Self {
            events: EventsConfig::from_env()?,
            api: ApiConfig::from_env()?,
            provider: ProviderConfig::from_env()?,
            alerts: AlertConfig::from_env()?,
            monitoring: MonitoringConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.events.validate()?;
        self.api.validate()?;
        self.provider.validate()?;
        self.alerts.validate()?;
        self.monitoring.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn set_required_vars() {
        env::set_var("BACKEND_EVENTS_URL", "https://events.example.com/ingest");
        env::set_var("AUTH_TOKEN", "a".repeat(32));
        env::set_var("PROVIDER_ACCOUNT_ID", "acct-123");
        env::set_var("PROVIDER_API_TOKEN", "token-abc");
        env::set_var("ANALYTICS_QUERY_URL", "https://analytics.example.com/query");
        env::set_var("ANALYTICS_INGEST_URL", "https://analytics.example.com/ingest");
    }

    fn clear_required_vars() {
        for key in [
            "BACKEND_EVENTS_URL",
            "AUTH_TOKEN",
            "PROVIDER_ACCOUNT_ID",
            "PROVIDER_API_TOKEN",
            "ANALYTICS_QUERY_URL",
            "ANALYTICS_INGEST_URL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn root_config_loads_from_env_with_defaults() {
        set_required_vars();
        let config = RootConfig::from_env().expect("config should load");
        assert_eq!(config.events.batch_max_events, 50);
        assert_eq!(config.api.port, 8080);
        clear_required_vars();
    }

    #[test]
    #[serial]
    fn api_config_rejects_short_auth_token() {
        let config = ApiConfig {
            host: "localhost".to_string(),
            port: 8080,
            auth_token: "short".to_string(),
            rate_limit_per_minute: 60,
            rate_limit_burst: 10,
            analytics_ingest_url: "https://analytics.example.com/ingest".to_string(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn monitoring_config_rejects_invalid_log_level() {
        let config = MonitoringConfig {
            prometheus_enabled: true,
            prometheus_port: 9090,
            log_level: "invalid".to_string(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn alert_config_cooldown_converts_to_duration() {
        let config = AlertConfig {
            cooldown_seconds: 1_800,
            ticket_webhook_url: None,
            page_webhook_url: None,
            analytics_query_url: "https://analytics.example.com/query".to_string(),
            tick_interval_seconds: 60,
        };
        assert_eq!(config.cooldown(), Duration::from_secs(1_800));
    }
}
