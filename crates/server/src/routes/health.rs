use crate::state::{ServerMetadata, ServerState};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use std::sync::Arc;

/// Liveness probe: 200 whenever the process is serving.
pub async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "titlecat-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

/// Readiness probe: 503 until the first snapshot has been published.
pub async fn readiness_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let snapshot = state.core.index.snapshot().ok();
    let ready = snapshot.as_ref().is_some_and(|s| !s.is_empty());
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = Json(json!({
        "status": if ready { "ready" } else { "not_ready" },
        "service": "titlecat-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
        "components": {
            "api": "ready",
            "index": if ready { "ready" } else { "empty" },
            "refresh": refresh_state_label(&state),
        },
        "snapshot_version": snapshot.as_ref().map(|s| s.version()).unwrap_or(0),
    }));

    (status, body)
}

/// Server metadata endpoint (authenticated)
pub async fn server_metadata(State(state): State<Arc<ServerState>>) -> Json<ServerMetadata> {
    let snapshot = state.core.index.snapshot().ok();
    let metadata = ServerMetadata {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        snapshot_version: snapshot.as_ref().map(|s| s.version()).unwrap_or(0),
        service_types: snapshot.as_ref().map(|s| s.len()).unwrap_or(0),
        dimension: state.core.index.dimension(),
        refresh_state: refresh_state_label(&state),
        last_refresh_error: state.core.refresh.last_error(),
    };

    Json(metadata)
}

fn refresh_state_label(state: &ServerState) -> String {
    format!("{:?}", state.core.refresh.state()).to_lowercase()
}
