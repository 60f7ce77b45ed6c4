pub mod deploy;
pub mod health;
pub mod ingest;

use actix_web::web;

/// Configures every route this service exposes. `health`/`ready` are wired
/// separately (outside the bearer-auth wrap) by the caller; everything here
/// sits behind it.
pub fn configure(cfg: &mut web::ServiceConfig) {
    deploy::configure(cfg);
    ingest::configure(cfg);
}
