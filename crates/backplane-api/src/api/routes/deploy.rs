//! Deploy ingress routes (spec §6 "Ingress — HTTP API (deploy service)").

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use backplane_build::{BuildError, EnvVarInput, Source};
use backplane_deploy::is_valid_worker_name;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvVarWire {
    key: String,
    sealed_value: String,
    #[serde(default)]
    is_secret: bool,
}

impl From<EnvVarWire> for EnvVarInput {
    fn from(w: EnvVarWire) -> Self {
        EnvVarInput { key: w.key, sealed_value: w.sealed_value, is_secret: w.is_secret }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeployBody {
    slug: String,
    /// The target edge provider; a single provider is configured per
    /// deployment of this service (`RootConfig.provider`), so this field is
    /// accepted for forward compatibility with multi-provider clients but
    /// not currently used to select between providers.
    #[serde(default)]
    #[allow(dead_code)]
    provider: Option<String>,
    repo_source: String,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    cancel_build_ids: Vec<String>,
    #[serde(default)]
    env_vars: Vec<EnvVarWire>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployAccepted {
    build_id: String,
    slug: String,
    status: backplane_build::BuildStatus,
}

fn validate_slug(slug: &str) -> ApiResult<()> {
    if !is_valid_worker_name(slug) {
        return Err(ApiError::BadRequest(format!("invalid slug `{slug}`")));
    }
    Ok(())
}

/// `POST /deploy`.
async fn deploy(state: web::Data<Arc<AppState>>, body: web::Json<DeployBody>) -> ApiResult<HttpResponse> {
    validate_slug(&body.slug)?;

    for build_id in &body.cancel_build_ids {
        let Ok(handle) = state.build_handle(build_id).await else { continue };
        let mut orchestrator = handle.orchestrator.lock().await;
        let _ = orchestrator.cancel(Some("superseded by new deploy".to_string()), None).await;
    }

    let build_id = Uuid::new_v4().to_string();
    let handle = state.build_handle(&build_id).await?;
    let mut orchestrator = handle.orchestrator.lock().await;
    let status = orchestrator
        .start(
            body.slug.clone(),
            Source::Git {
                repo_source: body.repo_source.clone(),
                branch: body.branch.clone(),
                access_token: body.access_token.clone(),
            },
            body.env_vars.iter().cloned().map(EnvVarInput::from).collect(),
        )
        .await?;

    Ok(HttpResponse::Accepted().json(DeployAccepted { build_id, slug: body.slug.clone(), status: status.status }))
}

/// `POST /deploy-archive`: `X-Slug` required, `X-Env-Vars` optional JSON array.
async fn deploy_archive(
    req: HttpRequest,
    state: web::Data<Arc<AppState>>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let slug = req
        .headers()
        .get("X-Slug")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing X-Slug header".to_string()))?
        .to_string();
    validate_slug(&slug)?;

    let env_vars: Vec<EnvVarInput> = match req.headers().get("X-Env-Vars").and_then(|h| h.to_str().ok()) {
        Some(raw) => {
            let wire: Vec<EnvVarWire> = serde_json::from_str(raw)
                .map_err(|e| ApiError::BadRequest(format!("invalid X-Env-Vars: {e}")))?;
            wire.into_iter().map(EnvVarInput::from).collect()
        }
        None => Vec::new(),
    };

    let build_id = Uuid::new_v4().to_string();
    let handle = state.build_handle(&build_id).await?;
    let mut orchestrator = handle.orchestrator.lock().await;
    let status = orchestrator
        .start_from_archive(slug.clone(), body.to_vec(), env_vars)
        .await?;

    Ok(HttpResponse::Accepted().json(DeployAccepted { build_id, slug, status: status.status }))
}

/// `GET /deploy/:buildId/status`.
async fn status(state: web::Data<Arc<AppState>>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let build_id = path.into_inner();
    let handle = state.build_handle(&build_id).await?;
    let orchestrator = handle.orchestrator.lock().await;
    let status = orchestrator.status()?;
    Ok(HttpResponse::Ok().json(status))
}

/// `GET /deploy/:buildId/events`.
async fn events(state: web::Data<Arc<AppState>>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let build_id = path.into_inner();
    let handle = state.build_handle(&build_id).await?;
    let orchestrator = handle.orchestrator.lock().await;
    // status() is used only to turn "never started" into a 404; the events
    // list itself is read independently since it outlives a cancelled build.
    orchestrator.status()?;
    Ok(HttpResponse::Ok().json(orchestrator.events()))
}

#[derive(Debug, Serialize)]
struct CancelResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

/// `DELETE /deploy/:buildId`.
async fn cancel(state: web::Data<Arc<AppState>>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let build_id = path.into_inner();
    let handle = state.build_handle(&build_id).await?;
    let mut orchestrator = handle.orchestrator.lock().await;
    let result = orchestrator.cancel(None, None).await?;

    if result.cancelled {
        return Ok(HttpResponse::Ok().json(CancelResponse { success: true, reason: None }));
    }
    match result.reason {
        backplane_build::CancelReason::NotFound => Err(ApiError::Build(BuildError::NotFound(build_id))),
        backplane_build::CancelReason::AlreadyFinished => {
            Ok(HttpResponse::BadRequest().json(CancelResponse { success: false, reason: Some("already_finished") }))
        }
        backplane_build::CancelReason::Cancelled => unreachable!("cancelled=true is handled above"),
    }
}

#[derive(Debug, Serialize)]
struct WorkerDeleteResponse {
    success: bool,
    message: String,
}

/// `DELETE /worker/:slug`.
async fn delete_worker(state: web::Data<Arc<AppState>>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let slug = path.into_inner();
    state.deploy_client.delete_worker(None, &slug).await?;
    Ok(HttpResponse::Ok().json(WorkerDeleteResponse { success: true, message: format!("worker {slug} deleted") }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/deploy", web::post().to(deploy))
        .route("/deploy-archive", web::post().to(deploy_archive))
        .route("/deploy/{buildId}/status", web::get().to(status))
        .route("/deploy/{buildId}/events", web::get().to(events))
        .route("/deploy/{buildId}", web::delete().to(cancel))
        .route("/worker/{slug}", web::delete().to(delete_worker));
}
