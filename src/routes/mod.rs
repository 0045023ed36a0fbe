//! HTTP route handlers for the facedir API.
//!
//! - `faces`: image registry and recognition endpoints
//! - `health`: health, readiness, metrics and version endpoints

pub mod faces;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::middleware::{self, RateLimiter};
use crate::state::AppState;

/// The complete application router with all middleware except CORS.
pub fn build_app(state: AppState) -> Router {
    let cfg = state.config.clone();
    let global_limiter = RateLimiter::from_config(&cfg.rate_limit);

    Router::new()
        .route("/", get(faces::root))
        .route("/recognition", post(faces::recognize))
        .route("/register", post(faces::register))
        .route("/change-file-name", put(faces::rename))
        .route("/delete-single-image", delete(faces::delete_one))
        .route("/delete-all-image", delete(faces::delete_all))
        .route("/img-db-info", get(faces::store_info))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .with_state(state)
        .layer(DefaultBodyLimit::max(cfg.server.max_upload_bytes))
        .layer(from_fn_with_state(cfg.clone(), middleware::validation::validate_request_middleware))
        .layer(from_fn_with_state(global_limiter, middleware::rate_limit::rate_limit_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg, middleware::security_headers::security_headers_middleware))
}
