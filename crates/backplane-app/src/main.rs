mod config;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use backplane_alerts::{AlertEvaluator, DurableConfigSource, DurableCooldownStore, HttpAnalyticsBackend, WebhookNotifier};
use backplane_api::AppState;
use config::AppConfig;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Periodically runs the SLO burn-rate evaluator (spec §4.E), independent of
/// the HTTP request path — there's no inbound trigger for alert evaluation,
/// only a wall-clock tick.
fn spawn_alert_tick_loop(state: Arc<AppState>) {
    let evaluator = AlertEvaluator::new(
        Arc::new(DurableConfigSource::new(state.durable.clone())),
        Arc::new(HttpAnalyticsBackend::new(state.config.alerts.analytics_query_url.clone())),
        Arc::new(DurableCooldownStore::new(state.durable.clone())),
        Arc::new(WebhookNotifier::new(
            state.config.alerts.page_webhook_url.clone(),
            state.config.alerts.ticket_webhook_url.clone(),
        )),
    );
    let interval = state.config.alerts.tick_interval();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match evaluator.tick().await {
                Ok(fired) if !fired.is_empty() => {
                    tracing::info!(count = fired.len(), "alert evaluation tick fired notifications");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "alert evaluation tick failed"),
            }
        }
    });
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    let app_config = AppConfig::load()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    init_logging(&app_config.root.monitoring.log_level);

    let server_address = app_config.server_address();
    tracing::info!(address = %server_address, "starting backplane server");

    let state = Arc::new(AppState::new(app_config.root));
    spawn_alert_tick_loop(state.clone());

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let app_state = state.clone();
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .configure(move |cfg| backplane_api::api::configure(cfg, &app_state))
    })
    .bind(server_address)?
    .run()
    .await
}
