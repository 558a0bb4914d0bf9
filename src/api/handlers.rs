//! HTTP handlers. Every handler returns the [`envelope`](super::envelope) shape.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::pipeline::{SessionContext, SessionStats, SessionStatus};
use crate::types::{LevelReport, Threshold};

// ============================================================================
// State
// ============================================================================

/// Shared state for all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub context: SessionContext,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(context: SessionContext) -> Self {
        Self {
            context,
            started_at: Instant::now(),
        }
    }
}

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub session: SessionStatus,
    pub source: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct ThresholdsResponse {
    pub current: f64,
    pub selectable: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SetThresholdRequest {
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct SetThresholdResponse {
    pub previous: f64,
    pub current: f64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub session: SessionStatus,
    pub source: String,
    #[serde(flatten)]
    pub stats: SessionStats,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/health
///
/// 503 once acquisition failed; the session will not recover.
pub async fn health(State(state): State<ApiState>) -> Response {
    let snapshot = state.context.latest_snapshot();
    let body = HealthResponse {
        healthy: !matches!(snapshot.status, SessionStatus::Failed { .. }),
        session: snapshot.status,
        source: snapshot.source,
        uptime_secs: state.started_at.elapsed().as_secs(),
    };
    let status = if body.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    ApiResponse::with_status(status, body)
}

/// GET /api/v1/level
pub async fn level(State(state): State<ApiState>) -> Response {
    let report: LevelReport = state.context.latest_level();
    ApiResponse::ok(report)
}

/// GET /api/v1/thresholds
pub async fn thresholds(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(ThresholdsResponse {
        current: state.context.threshold().get().db(),
        selectable: Threshold::selectable().map(Threshold::db).collect(),
    })
}

/// PUT /api/v1/threshold
pub async fn set_threshold(
    State(state): State<ApiState>,
    axum::Json(request): axum::Json<SetThresholdRequest>,
) -> Response {
    let next = match Threshold::try_from_db(request.value) {
        Ok(t) => t,
        Err(e) => return ApiErrorResponse::bad_request(e.to_string()),
    };

    let previous = state.context.threshold().set(next);
    if previous != next {
        info!(from = %previous, to = %next, "Threshold changed via API");
    }

    ApiResponse::ok(SetThresholdResponse {
        previous: previous.db(),
        current: next.db(),
    })
}

/// GET /api/v1/stats
pub async fn stats(State(state): State<ApiState>) -> Response {
    let snapshot = state.context.latest_snapshot();
    ApiResponse::ok(StatsResponse {
        session: snapshot.status,
        source: snapshot.source,
        stats: snapshot.stats,
    })
}

/// Fallback for unknown API paths.
pub async fn not_found() -> Response {
    ApiErrorResponse::not_found("no such endpoint")
}
