//! API route table.

use axum::routing::{get, put};
use axum::Router;

use super::handlers::{self, ApiState};

/// Routes nested under `/api/v1`.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/level", get(handlers::level))
        .route("/thresholds", get(handlers::thresholds))
        .route("/threshold", put(handlers::set_threshold))
        .route("/stats", get(handlers::stats))
        .with_state(state)
}
