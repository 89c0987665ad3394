use crate::error::ServerResult;
use crate::state::ServerState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use std::sync::Arc;
use titlecat::RefreshOutcome;

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hits: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recomputed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

/// `POST /api/v1/refresh`: rebuild the snapshot now.
///
/// Answers 202 with `"status": "skipped"` when a refresh is already running.
pub async fn trigger_refresh(
    State(state): State<Arc<ServerState>>,
) -> ServerResult<impl IntoResponse> {
    tracing::info!("refresh requested over HTTP");

    let response = match state.core.refresh.refresh().await? {
        RefreshOutcome::Published(report) => (
            StatusCode::OK,
            Json(RefreshResponse {
                status: "published",
                snapshot_version: Some(report.version),
                entries: Some(report.entries),
                cache_hits: Some(report.cache_hits),
                recomputed: Some(report.recomputed),
                skipped: Some(report.skipped),
                elapsed_ms: Some(report.elapsed.as_millis() as u64),
            }),
        ),
        RefreshOutcome::Skipped => (
            StatusCode::ACCEPTED,
            Json(RefreshResponse {
                status: "skipped",
                snapshot_version: None,
                entries: None,
                cache_hits: None,
                recomputed: None,
                skipped: None,
                elapsed_ms: None,
            }),
        ),
    };

    Ok(response)
}
