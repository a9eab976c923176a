use axum::Json;
use crate::models::{HealthResponse, RootResponse};
use tracing::debug;

/// API banner
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "PDF Highlighter API is running".to_string(),
    })
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint
pub async fn ready_check() -> Json<HealthResponse> {
    debug!("Readiness check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Service is ready".to_string(),
    })
}
