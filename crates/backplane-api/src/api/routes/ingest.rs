//! Observability ingress routes (spec §6 "Ingest"): the write side of
//! analytics (`POST /ingest/api-metrics`) and the session item stream RPC
//! (`ingestSessionMetrics` generalized to an HTTP route per session).

use crate::error::{ApiError, ApiResult};
use crate::ingest::ApiMetricsPoint;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use backplane_sessions::{split_ingest_batch_for_do, Item, MAX_INGEST_BATCH_BYTES, MAX_INGEST_ITEM_BYTES};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMetricsBody {
    provider: String,
    resolved_model: String,
    client_name: String,
    status_code: u16,
    inference_provider: String,
    ttfb_ms: f64,
    complete_request_ms: f64,
}

/// `POST /ingest/api-metrics`: admin-authenticated, 204 on success. Forwards
/// one structured event downstream exactly the way
/// `backplane_alerts::providers::HttpAnalyticsBackend` forwards alert
/// notifications: a single outbound call plus a `tracing` record of the
/// attempt, not a queued/batched stream (spec names no batching semantics
/// for this endpoint, unlike the events webhook path).
async fn ingest_api_metrics(state: web::Data<Arc<AppState>>, body: web::Json<ApiMetricsBody>) -> ApiResult<HttpResponse> {
    let point = ApiMetricsPoint::new(
        body.provider.clone(),
        body.resolved_model.clone(),
        body.client_name.clone(),
        body.status_code,
        body.inference_provider.clone(),
        body.ttfb_ms,
        body.complete_request_ms,
    );

    state
        .ingest_client
        .write_api_metrics(&point)
        .await
        .map_err(ApiError::BadGateway)?;

    tracing::info!(
        provider = %body.provider,
        status_code = body.status_code,
        "forwarded api metrics point to analytics ingest"
    );

    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionIngestBody {
    items: Vec<Item>,
    #[serde(default)]
    ingest_version: u32,
    #[serde(default)]
    kilo_user_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct SessionIngestResponse {
    accepted: usize,
    dropped: usize,
}

/// `ingestSessionMetrics(payload)` generalized to one HTTP route per
/// session: splits the batch the way a per-session actor call would be
/// chunked, then feeds each surviving item through the aggregator in order.
async fn ingest_session(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<SessionIngestBody>,
) -> ApiResult<HttpResponse> {
    let session_id = path.into_inner();
    let body = body.into_inner();

    let split = split_ingest_batch_for_do(body.items, MAX_INGEST_ITEM_BYTES, MAX_INGEST_BATCH_BYTES);
    let handle = state.session_handle(&session_id, body.kilo_user_id).await?;

    let mut accepted = 0;
    {
        let mut aggregator = handle.aggregator.lock().await;
        for chunk in split.chunks {
            for item in chunk {
                aggregator.ingest(item, body.ingest_version).await?;
                accepted += 1;
            }
        }
    }

    Ok(HttpResponse::Ok().json(SessionIngestResponse { accepted, dropped: split.dropped }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ingest/api-metrics", web::post().to(ingest_api_metrics))
        .route("/ingest/session/{sessionId}", web::post().to(ingest_session));
}
