use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use backplane_core::auth::bearer_token_matches;

/// Bearer-token admin authentication (spec §6: "Auth: Bearer token in
/// `Authorization` header; missing/mismatch → 401"). Every admin-facing
/// route requires it except `/health` and `/ready`.
pub struct BearerAuthMiddleware {
    token: String,
}

impl BearerAuthMiddleware {
    pub fn new(token: String) -> Self {
        if token.is_empty() {
            panic!("AUTH_TOKEN cannot be empty");
        }
        Self { token }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BearerAuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = BearerAuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BearerAuthMiddlewareService {
            service: Rc::new(service),
            token: Rc::new(self.token.clone()),
        }))
    }
}

pub struct BearerAuthMiddlewareService<S> {
    service: Rc<S>,
    token: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for BearerAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let token = self.token.clone();

        Box::pin(async move {
            let path = req.path();
            if path == "/health" || path == "/ready" {
                return service.call(req).await;
            }

            let auth_header = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok());

            if bearer_token_matches(auth_header, &token) {
                service.call(req).await
            } else {
                Err(ErrorUnauthorized(
                    serde_json::json!({ "error": "Unauthorized" }),
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    #[actix_web::test]
    async fn allows_health_check_without_a_token() {
        let app = test::init_service(
            App::new()
                .wrap(BearerAuthMiddleware::new("secret1234567890".to_string()))
                .route("/health", web::get().to(|| async { HttpResponse::Ok().body("OK") })),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn rejects_missing_authorization_header() {
        let app = test::init_service(
            App::new()
                .wrap(BearerAuthMiddleware::new("secret1234567890".to_string()))
                .route("/deploy", web::post().to(|| async { HttpResponse::Ok().body("ok") })),
        )
        .await;

        let req = test::TestRequest::post().uri("/deploy").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn allows_a_matching_bearer_token() {
        let app = test::init_service(
            App::new()
                .wrap(BearerAuthMiddleware::new("secret1234567890".to_string()))
                .route("/deploy", web::post().to(|| async { HttpResponse::Ok().body("ok") })),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/deploy")
            .insert_header(("Authorization", "Bearer secret1234567890"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[test]
    #[should_panic(expected = "AUTH_TOKEN cannot be empty")]
    fn new_with_empty_token_panics() {
        BearerAuthMiddleware::new("".to_string());
    }
}
