//! REST API module using Axum
//!
//! Read-only views of the running session plus the threshold picker:
//!
//! - `GET  /api/v1/health`
//! - `GET  /api/v1/level`
//! - `GET  /api/v1/thresholds`
//! - `PUT  /api/v1/threshold`  `{"value": 45}`
//! - `GET  /api/v1/stats`

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::ApiState;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Comma-separated list of origins allowed to call the API cross-origin.
pub const CORS_ORIGINS_ENV_VAR: &str = "VOLMON_CORS_ORIGINS";

/// Same-origin only unless [`CORS_ORIGINS_ENV_VAR`] lists origins.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var(CORS_ORIGINS_ENV_VAR) {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Build the application router.
pub fn create_app(state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
