//! HTTP surface: route wiring, bearer auth, and rate limiting (spec §6
//! "Ingress — HTTP API").

pub mod middleware;
pub mod rate_limit;
pub mod routes;

use crate::monitoring::metrics;
use crate::state::AppState;
use actix_web::web;
use middleware::auth::BearerAuthMiddleware;
use rate_limit::{RateLimitConfig, RateLimitMiddleware};
use std::sync::Arc;

/// Mounts every route. `/health` and `/ready` are liveness/readiness probes
/// and stay outside the bearer-auth and rate-limit wraps entirely; `/metrics`
/// is operator-facing and likewise unauthenticated, matching the teacher's
/// Prometheus scrape convention. Everything else sits behind both.
pub fn configure(cfg: &mut web::ServiceConfig, state: &Arc<AppState>) {
    routes::health::configure_health_routes(cfg);
    routes::health::configure_readiness_routes(cfg);
    metrics::configure_routes(cfg);

    let auth = BearerAuthMiddleware::new(state.config.api.auth_token.clone());
    let rate_limit = RateLimitMiddleware::new(RateLimitConfig {
        requests_per_minute: state.config.api.rate_limit_per_minute,
        burst_size: state.config.api.rate_limit_burst,
    });

    cfg.service(
        web::scope("")
            .wrap(auth)
            .wrap(rate_limit)
            .configure(routes::configure),
    );
}
