//! JSON envelope shared by every endpoint.
//!
//! Success: `{ "data": T, "meta": { "timestamp", "api_version" } }`
//! Error:   `{ "error": { "code", "message" }, "meta": { ... } }`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

pub const API_VERSION: &str = "1";

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
    pub api_version: &'static str,
}

impl ResponseMeta {
    fn now() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            api_version: API_VERSION,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        Self::with_status(StatusCode::OK, data)
    }

    pub fn with_status(status: StatusCode, data: T) -> Response {
        let body = Self {
            data,
            meta: ResponseMeta::now(),
        };
        (status, axum::Json(body)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
    pub meta: ResponseMeta,
}

impl ApiErrorResponse {
    fn build(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
        let body = Self {
            error: ErrorDetail {
                code,
                message: message.into(),
            },
            meta: ResponseMeta::now(),
        };
        (status, axum::Json(body)).into_response()
    }

    pub fn not_found(message: impl Into<String>) -> Response {
        Self::build(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Response {
        Self::build(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Response {
        Self::build(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }
}
