//! REST API endpoint handlers

use crate::api::types::{ApiResponse, Empty};
use crate::error::AppError;
use crate::scheduler::RefreshHandle;
use crate::services::{IngestService, MatrixView, UnitStatusEntry};
use crate::state::AppState;
use crate::types::RowCount;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared state for API handlers
pub struct ApiState {
    pub app: Arc<AppState>,
    pub refresh: RefreshHandle,
    ingest_running: AtomicBool,
}

impl ApiState {
    pub fn new(app: Arc<AppState>, refresh: RefreshHandle) -> Self {
        Self {
            app,
            refresh,
            ingest_running: AtomicBool::new(false),
        }
    }
}

// ============================================================================
// Health Check
// ============================================================================

/// Health check endpoint - GET /health or GET /
pub async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::<Empty>::success_with_message("Confluence scanner API is running"))
}

// ============================================================================
// Scanner matrix
// ============================================================================

/// Latest classified matrix - GET /api/v1/matrix
pub async fn get_matrix(State(state): State<Arc<ApiState>>) -> Json<ApiResponse<MatrixView>> {
    Json(ApiResponse::success_with_data(state.refresh.latest()))
}

/// Manual refresh - POST /api/v1/refresh
pub async fn refresh(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    state.refresh.request_refresh();
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::<Empty>::success_with_message("Refresh requested")),
    )
}

// ============================================================================
// Store inspection
// ============================================================================

/// Row count per (instrument, timeframe) - GET /api/v1/counts
pub async fn get_counts(
    State(state): State<Arc<ApiState>>,
) -> (StatusCode, Json<ApiResponse<Vec<RowCount>>>) {
    let store = Arc::clone(&state.app.store);

    let result = tokio::task::spawn_blocking(move || store.row_counts())
        .await
        .map_err(|e| AppError::Internal(format!("Row count task failed: {}", e)))
        .and_then(|r| r);

    match result {
        Ok(counts) => (StatusCode::OK, Json(ApiResponse::success_with_data(counts))),
        Err(e) => {
            error!("Failed to read row counts: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::from_error(&e)))
        }
    }
}

// ============================================================================
// Ingest
// ============================================================================

/// Last outcome per unit - GET /api/v1/ingest
pub async fn get_ingest_status(
    State(state): State<Arc<ApiState>>,
) -> Json<ApiResponse<Vec<UnitStatusEntry>>> {
    Json(ApiResponse::success_with_data(IngestService::statuses(&state.app)))
}

/// Start an ingest run in the background - POST /api/v1/ingest
///
/// The matrix is refreshed once the run finishes. Only one run at a time.
pub async fn start_ingest(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    if state
        .ingest_running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        warn!("Ingest already running, request rejected");
        return (
            StatusCode::CONFLICT,
            Json(ApiResponse::<Empty>::error("Ingest already running")),
        );
    }

    let task_state = Arc::clone(&state);
    tokio::spawn(async move {
        let report = IngestService::run(&task_state.app).await;
        info!(
            "Background ingest finished: {} stored, {} skipped, {} failed",
            report.stored(),
            report.skipped(),
            report.failed()
        );
        task_state.ingest_running.store(false, Ordering::Release);
        task_state.refresh.request_refresh();
    });

    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::<Empty>::success_with_message("Ingest started")),
    )
}
