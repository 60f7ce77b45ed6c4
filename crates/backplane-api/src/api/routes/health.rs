use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    version: &'static str,
}

/// `GET /health`: liveness only, never touches storage or provider config.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct ReadyResponse {
    ready: bool,
    storage: &'static str,
}

/// `GET /ready`: durable storage must accept a round-trip write/read; the
/// provider and analytics URLs were already validated as well-formed at
/// startup by `RootConfig::validate`, so readiness here only probes the one
/// thing the process can't know at boot time.
pub async fn readiness_check(state: web::Data<Arc<AppState>>) -> HttpResponse {
    const PROBE_KEY: &str = "healthz/readiness-probe";
    match state.durable.put(PROBE_KEY, b"ok".to_vec()).await {
        Ok(()) => HttpResponse::Ok().json(ReadyResponse { ready: true, storage: "reachable" }),
        Err(e) => {
            tracing::error!(error = %e, "readiness probe failed to reach durable storage");
            HttpResponse::ServiceUnavailable().json(ReadyResponse { ready: false, storage: "unreachable" })
        }
    }
}

pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}

pub fn configure_readiness_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/ready", web::get().to(readiness_check));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use actix_web::{test, App};
    use backplane_core::config::{
        AlertConfig, ApiConfig, EventsConfig, MonitoringConfig, ProviderConfig, RootConfig,
    };

    fn test_config() -> RootConfig {
        RootConfig {
            events: EventsConfig {
                batch_max_events: 50,
                batch_max_ms: 5_000,
                backoff_base_ms: 1_000,
                stop_after_attempts: 6,
                backend_events_url: "https://events.example.com/ingest".to_string(),
                backend_events_token: String::new(),
            },
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                auth_token: "a".repeat(32),
                rate_limit_per_minute: 60,
                rate_limit_burst: 10,
                analytics_ingest_url: "https://analytics.example.com/ingest".to_string(),
            },
            provider: ProviderConfig {
                base_url: "https://provider.example.com".to_string(),
                account_id: "acct".to_string(),
                api_token: "token".to_string(),
            },
            alerts: AlertConfig {
                cooldown_seconds: 1_800,
                ticket_webhook_url: None,
                page_webhook_url: None,
                analytics_query_url: "https://analytics.example.com/query".to_string(),
                tick_interval_seconds: 60,
            },
            monitoring: MonitoringConfig { prometheus_enabled: true, prometheus_port: 9090, log_level: "info".to_string() },
        }
    }

    #[actix_web::test]
    async fn health_check_reports_healthy() {
        let app = test::init_service(App::new().configure(configure_health_routes)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn readiness_check_succeeds_against_in_memory_storage() {
        let state = Arc::new(AppState::new(test_config()));
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).configure(configure_readiness_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/ready").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
