//! Analytics write-side HTTP seam (spec §6 "Observability ingress"). The
//! analytics store itself is out of scope as a concrete technology (spec §1
//! Non-goals name the *query* backend; the write side is the same HTTP-seam
//! shape), grounded on `backplane_alerts::providers::HttpAnalyticsBackend`'s
//! reqwest-client-plus-bearer-token pattern.

use async_trait::async_trait;
use backplane_sessions::{SessionError, SessionMetrics, SessionMetricsSink};
use serde::Serialize;
use std::time::Duration;

/// One row of the API metrics analytics schema (spec §6, column bindings
/// fixed bit-exactly).
#[derive(Debug, Clone, Serialize)]
pub struct ApiMetricsPoint {
    pub blob1: String,
    pub blob2: String,
    pub blob3: String,
    pub blob4: String,
    pub blob5: String,
    pub double1: f64,
    pub double2: f64,
    pub double3: f64,
}

impl ApiMetricsPoint {
    pub fn new(
        provider: impl Into<String>,
        resolved_model: impl Into<String>,
        client_name: impl Into<String>,
        status_code: u16,
        inference_provider: impl Into<String>,
        ttfb_ms: f64,
        complete_request_ms: f64,
    ) -> Self {
        Self {
            blob1: provider.into(),
            blob2: resolved_model.into(),
            blob3: client_name.into(),
            blob4: if status_code >= 400 { "1".to_string() } else { "0".to_string() },
            blob5: inference_provider.into(),
            double1: ttfb_ms,
            double2: complete_request_ms,
            double3: status_code as f64,
        }
    }
}

/// One row of the session metrics analytics schema (spec §6).
#[derive(Debug, Clone, Serialize)]
struct SessionMetricsPoint {
    index1: String,
    blob1: String,
    blob2: String,
    blob3: String,
    blob4: Option<String>,
    blob5: String,
    double1: i64,
    double2: i64,
    double3: u64,
    double4: u64,
    double5: u64,
    double6: u64,
    double7: f64,
    double8: u64,
    double9: u64,
    double10: u64,
    double11: u32,
}

impl From<&SessionMetrics> for SessionMetricsPoint {
    fn from(m: &SessionMetrics) -> Self {
        Self {
            index1: m.platform.clone(),
            blob1: format!("{:?}", m.termination_reason).to_lowercase(),
            blob2: m.platform.clone(),
            blob3: m.organization_id.clone().unwrap_or_default(),
            blob4: m.kilo_user_id.clone(),
            blob5: m.model.clone().unwrap_or_default(),
            double1: m.session_duration_ms,
            double2: m.time_to_first_response_ms.unwrap_or(-1),
            double3: m.total_turns,
            double4: m.total_steps,
            double5: m.total_errors,
            double6: m.total_tokens,
            double7: m.total_cost,
            double8: m.compaction_count,
            double9: m.stuck_tool_call_count,
            double10: m.auto_compaction_count,
            double11: m.ingest_version,
        }
    }
}

/// Posts analytics data points to the configured ingestion endpoint, and
/// doubles as the `SessionMetricsSink` the Session Aggregator emits through.
pub struct AnalyticsIngestClient {
    client: reqwest::Client,
    ingest_url: String,
}

impl AnalyticsIngestClient {
    pub fn new(ingest_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client builds"),
            ingest_url,
        }
    }

    pub async fn write_api_metrics(&self, point: &ApiMetricsPoint) -> Result<(), String> {
        self.post(point).await
    }

    async fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<(), String> {
        let response = self
            .client
            .post(&self.ingest_url)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("analytics ingest returned {}", response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionMetricsSink for AnalyticsIngestClient {
    async fn ingest_session_metrics(&self, metrics: &SessionMetrics) -> Result<(), SessionError> {
        let point = SessionMetricsPoint::from(metrics);
        self.post(&point).await.map_err(SessionError::Emission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn api_metrics_point_sets_blob4_from_status_code() {
        let ok = ApiMetricsPoint::new("anthropic", "claude-3", "cli", 200, "anthropic", 10.0, 50.0);
        assert_eq!(ok.blob4, "0");
        let failed = ApiMetricsPoint::new("anthropic", "claude-3", "cli", 500, "anthropic", 10.0, 50.0);
        assert_eq!(failed.blob4, "1");
    }

    #[tokio::test]
    async fn write_api_metrics_posts_json_to_the_configured_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = AnalyticsIngestClient::new(format!("{}/ingest", server.uri()));
        let point = ApiMetricsPoint::new("anthropic", "claude-3", "cli", 200, "anthropic", 10.0, 50.0);
        client.write_api_metrics(&point).await.unwrap();
    }

    #[tokio::test]
    async fn write_api_metrics_surfaces_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = AnalyticsIngestClient::new(format!("{}/ingest", server.uri()));
        let point = ApiMetricsPoint::new("anthropic", "claude-3", "cli", 200, "anthropic", 10.0, 50.0);
        assert!(client.write_api_metrics(&point).await.is_err());
    }
}
