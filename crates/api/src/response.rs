//! Standardized API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::EndpointStats;
use serde::{Deserialize, Serialize};
use telemetry::MetricsSnapshot;
use upstream::VideoData;

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub success: bool,
    pub transcript: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DescriptionResponse {
    pub success: bool,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoResponse {
    pub success: bool,
    pub video: VideoData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LicenseResponse {
    pub success: bool,
    pub license_id: String,
    pub quota_window_requests: u32,
    pub quota_window_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheClearResponse {
    pub success: bool,
    pub scope: String,
    pub removed: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub success: bool,
    pub window_hours: i64,
    pub endpoints: Vec<EndpointStats>,
    pub metrics: MetricsSnapshot,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_connected: bool,
    pub audit_connected: bool,
    pub upstream_reachable: bool,
    pub in_flight_calls: u64,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.into(),
        }
    }
}

/// API error type with stable error codes.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
            retry_after: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "VALID_001", msg)
    }

    pub fn missing_license() -> Self {
        Self::with_code(StatusCode::UNAUTHORIZED, "LIC_001", "License key is required")
    }

    pub fn invalid_license() -> Self {
        Self::with_code(StatusCode::UNAUTHORIZED, "LIC_002", "Invalid or inactive license")
    }

    pub fn admin_disabled() -> Self {
        Self::with_code(StatusCode::FORBIDDEN, "ADMIN_001", "Admin API is disabled")
    }

    pub fn admin_unauthorized() -> Self {
        Self::with_code(StatusCode::UNAUTHORIZED, "ADMIN_002", "Invalid admin token")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.response)).into_response();

        // Add Retry-After header for rate limit responses
        if let Some(retry_after) = self.retry_after {
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}

impl From<gateway_core::Error> for ApiError {
    fn from(err: gateway_core::Error) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            response: ErrorResponse::new(err.public_message(), err.code()),
            retry_after: err.retry_after(),
        }
    }
}
