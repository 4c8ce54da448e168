use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::models::sync::BackfillOutcome;
use crate::services::backfill::BackfillStatus;

/// Manual trigger; the batch is bounded, so run it inline and hand the
/// outcome back to the caller.
pub async fn run_backfill(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<BackfillOutcome>>, ApiError> {
    let outcome = state.shared.backfill.process_batch().await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn get_backfill_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<BackfillStatus>>, ApiError> {
    let status = state.shared.backfill.status().await?;
    Ok(Json(ApiResponse::success(status)))
}
