//! API route handlers
//!
//! - `health`: liveness, readiness and server metadata
//! - `categorize`: job-title categorization
//! - `refresh`: out-of-band catalog refresh

pub mod categorize;
pub mod health;
pub mod refresh;

use crate::error::ServerError;
use axum::Json;
use axum::response::IntoResponse;
use serde_json::json;

/// `GET /`: service name, version and endpoint list.
pub async fn api_info() -> impl IntoResponse {
    Json(json!({
        "name": "titlecat",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": "v1",
        "endpoints": [
            "/api/v1/categorize",
            "/api/v1/refresh",
            "/api/v1/metadata",
            "/health",
            "/ready"
        ]
    }))
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
