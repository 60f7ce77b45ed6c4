//! Unifies every crate's error taxonomy into an HTTP response (spec §7:
//! "taxonomy (behavior, not type names)" translated at the ingress boundary
//! into status codes plus `{error: message}` bodies).

use actix_web::{HttpResponse, ResponseError};
use backplane_alerts::AlertError;
use backplane_build::BuildError;
use backplane_core::CoreError;
use backplane_deploy::DeployError;
use backplane_events::EventsError;
use backplane_sessions::SessionError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Events(#[from] EventsError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Alert(#[from] AlertError),

    #[error(transparent)]
    Storage(#[from] CoreError),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("downstream ingest failed: {0}")]
    BadGateway(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorBody {
            error: self.to_string(),
        })
    }

    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Build(BuildError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Deploy(DeployError::InvalidWorkerName(_)) => StatusCode::BAD_REQUEST,
            ApiError::Deploy(DeployError::CircuitOpen) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn build_not_found_maps_to_404() {
        let err = ApiError::Build(BuildError::NotFound("b-1".to_string()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn circuit_open_maps_to_503() {
        let err = ApiError::Deploy(DeployError::CircuitOpen);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn generic_storage_error_maps_to_500() {
        let err = ApiError::Storage(CoreError::Internal("boom".to_string()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_gateway_maps_to_502() {
        let err = ApiError::BadGateway("connection refused".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
