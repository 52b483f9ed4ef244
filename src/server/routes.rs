use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::repository::{Repository, RepositoryError, ScanRepository};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QueueScanRequest {
    pub project_id: Uuid,
}

/// POST /api/scans
///
/// Queues a scan for the given project. 201 with the created scan, 404 if
/// the project does not exist, 409 if a scan is already in progress for it
/// (the scan is still queued in that case — 409 signals the caller that it
/// will wait behind the active one, matching `queue_position > 0`).
pub async fn create_scan<R>(
    State(state): State<AppState<R>>,
    Json(payload): Json<QueueScanRequest>,
) -> impl IntoResponse
where
    R: Repository + Send + Sync + 'static,
{
    match state.lifecycle.queue_scan(payload.project_id).await {
        Ok(scan) => {
            let status = if scan.queue_position.unwrap_or(0) > 0 {
                StatusCode::CONFLICT
            } else {
                StatusCode::CREATED
            };
            (status, Json(json!({ "scan": scan }))).into_response()
        }
        Err(RepositoryError::ProjectNotFound(id)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("project {} not found", id) })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to queue scan");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response()
        }
    }
}

/// GET /api/scans/:id
pub async fn get_scan_status<R>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse
where
    R: Repository + Send + Sync + 'static,
{
    match state.repo.get_scan(id).await {
        Ok(scan) => (StatusCode::OK, Json(json!({ "scan": scan }))).into_response(),
        Err(RepositoryError::ScanNotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("scan {} not found", id) })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to load scan");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response()
        }
    }
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
