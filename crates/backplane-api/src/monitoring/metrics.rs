//! Prometheus metrics (spec §3.4 "Observability — ambient stack"): counters
//! and histograms for build pipeline transitions, webhook flush outcomes,
//! alert notification delivery, and session emissions, plus a `/metrics`
//! scrape endpoint.

use actix_web::{web, HttpResponse};
use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Once;
use std::time::Instant;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    /// Build status transitions (spec §4.C state machine).
    pub static ref BUILD_STATE_TRANSITIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("build_state_transitions_total", "Total number of build status transitions")
            .namespace("backplane")
            .subsystem("build"),
        &["from_status", "to_status"]
    ).unwrap();

    /// Wall-clock duration of each pipeline step (install/build/migrate/...).
    pub static ref BUILD_PIPELINE_STEP_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("pipeline_step_duration_seconds", "Duration of a build pipeline step")
            .namespace("backplane")
            .subsystem("build")
            .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["project_type", "step"]
    ).unwrap();

    /// Events Manager webhook flush attempts, by outcome (spec §4.B).
    pub static ref WEBHOOK_FLUSH_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("webhook_flush_attempts_total", "Total webhook flush attempts")
            .namespace("backplane")
            .subsystem("events"),
        &["outcome"]
    ).unwrap();

    /// Webhook flush round-trip latency.
    pub static ref WEBHOOK_FLUSH_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("webhook_flush_duration_seconds", "Duration of a webhook flush call")
            .namespace("backplane")
            .subsystem("events")
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["outcome"]
    ).unwrap();

    /// Alert notifications fired, by channel and outcome (spec §4.E).
    pub static ref ALERT_NOTIFICATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("alert_notifications_total", "Total alert notifications dispatched")
            .namespace("backplane")
            .subsystem("alerts"),
        &["channel", "outcome"]
    ).unwrap();

    /// Session metrics emissions, by outcome (spec §4.F).
    pub static ref SESSION_EMISSIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("session_emissions_total", "Total session metrics record emissions")
            .namespace("backplane")
            .subsystem("sessions"),
        &["outcome"]
    ).unwrap();

    /// API metrics points forwarded to the analytics ingest endpoint.
    pub static ref API_METRICS_INGESTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("api_metrics_ingested_total", "Total API metrics points forwarded downstream")
            .namespace("backplane")
            .subsystem("ingest"),
        &["outcome"]
    ).unwrap();

    /// Inbound HTTP request counts and latency (ambient, every route).
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("http_requests_total", "Total HTTP requests handled")
            .namespace("backplane")
            .subsystem("http"),
        &["method", "path", "status"]
    ).unwrap();

    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("http_request_duration_seconds", "Duration of HTTP requests")
            .namespace("backplane")
            .subsystem("http")
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["method", "path"]
    ).unwrap();
}

static INIT: Once = Once::new();

pub fn init_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(BUILD_STATE_TRANSITIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BUILD_PIPELINE_STEP_DURATION.clone()))?;
    REGISTRY.register(Box::new(WEBHOOK_FLUSH_ATTEMPTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WEBHOOK_FLUSH_DURATION.clone()))?;
    REGISTRY.register(Box::new(ALERT_NOTIFICATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SESSION_EMISSIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(API_METRICS_INGESTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    Ok(())
}

/// Build pipeline recorder.
pub struct BuildMetrics;

impl BuildMetrics {
    pub fn record_transition(from_status: &str, to_status: &str) {
        BUILD_STATE_TRANSITIONS_TOTAL
            .with_label_values(&[from_status, to_status])
            .inc();
    }

    pub fn start_step(project_type: &str, step: &str) -> PipelineStepTimer {
        PipelineStepTimer {
            project_type: project_type.to_string(),
            step: step.to_string(),
            start: Instant::now(),
        }
    }
}

pub struct PipelineStepTimer {
    project_type: String,
    step: String,
    start: Instant,
}

impl PipelineStepTimer {
    pub fn finish(self) {
        BUILD_PIPELINE_STEP_DURATION
            .with_label_values(&[&self.project_type, &self.step])
            .observe(self.start.elapsed().as_secs_f64());
    }
}

/// Events Manager webhook flush recorder.
pub struct EventsMetrics;

impl EventsMetrics {
    pub fn start_flush() -> FlushTimer {
        FlushTimer { start: Instant::now() }
    }
}

pub struct FlushTimer {
    start: Instant,
}

impl FlushTimer {
    fn finish(self, outcome: &str) {
        let elapsed = self.start.elapsed().as_secs_f64();
        WEBHOOK_FLUSH_ATTEMPTS_TOTAL.with_label_values(&[outcome]).inc();
        WEBHOOK_FLUSH_DURATION.with_label_values(&[outcome]).observe(elapsed);
    }

    pub fn success(self) {
        self.finish("success");
    }

    pub fn failure(self) {
        self.finish("failure");
    }
}

/// Alert Evaluator notification recorder.
pub struct AlertMetrics;

impl AlertMetrics {
    pub fn record_notification(channel: &str, outcome: &str) {
        ALERT_NOTIFICATIONS_TOTAL.with_label_values(&[channel, outcome]).inc();
    }
}

/// Session Aggregator emission recorder.
pub struct SessionMetricsRecorder;

impl SessionMetricsRecorder {
    pub fn record_emission(outcome: &str) {
        SESSION_EMISSIONS_TOTAL.with_label_values(&[outcome]).inc();
    }
}

/// Analytics ingest recorder (API metrics write side).
pub struct IngestMetrics;

impl IngestMetrics {
    pub fn record_api_metrics_write(outcome: &str) {
        API_METRICS_INGESTED_TOTAL.with_label_values(&[outcome]).inc();
    }
}

/// Inbound HTTP request recorder.
pub struct ApiMetrics;

impl ApiMetrics {
    pub fn record_request(method: &str, path: &str, status: u16, duration: std::time::Duration) {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        HTTP_REQUEST_DURATION
            .with_label_values(&[method, path])
            .observe(duration.as_secs_f64());
    }
}

pub fn export_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder.encode_to_string(&metric_families)
}

async fn metrics_handler() -> HttpResponse {
    match export_metrics() {
        Ok(body) => HttpResponse::Ok().content_type("text/plain; version=0.0.4").body(body),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode prometheus metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    INIT.call_once(|| {
        if let Err(e) = init_metrics() {
            tracing::error!(error = %e, "failed to register prometheus metrics");
        }
    });
    cfg.route("/metrics", web::get().to(metrics_handler));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn build_transitions_are_counted() {
        let _ = init_metrics();
        BuildMetrics::record_transition("queued", "building");
        let families = REGISTRY.gather();
        assert!(!families.is_empty());
    }

    #[test]
    fn pipeline_step_timer_records_a_duration() {
        let _ = init_metrics();
        let timer = BuildMetrics::start_step("nextjs", "install");
        std::thread::sleep(Duration::from_millis(5));
        timer.finish();
        let exported = export_metrics().expect("export succeeds");
        assert!(exported.contains("backplane_build_pipeline_step_duration_seconds"));
    }

    #[test]
    fn flush_timer_records_success_and_failure_separately() {
        let _ = init_metrics();
        EventsMetrics::start_flush().success();
        EventsMetrics::start_flush().failure();
        let exported = export_metrics().expect("export succeeds");
        assert!(exported.contains("backplane_events_webhook_flush_attempts_total"));
    }

    #[test]
    fn metrics_export_contains_registered_families() {
        let _ = init_metrics();
        AlertMetrics::record_notification("page", "success");
        SessionMetricsRecorder::record_emission("success");
        IngestMetrics::record_api_metrics_write("success");
        ApiMetrics::record_request("POST", "/deploy", 202, Duration::from_millis(42));

        let exported = export_metrics().expect("export succeeds");
        assert!(exported.contains("backplane_alerts_alert_notifications_total"));
        assert!(exported.contains("backplane_sessions_session_emissions_total"));
        assert!(exported.contains("backplane_ingest_api_metrics_ingested_total"));
        assert!(exported.contains("backplane_http_http_requests_total"));
    }
}
