use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, ImportStatusDto};
use crate::api::types::DeleteSummaryDto;
use crate::domain::Source;
use crate::models::sync::SyncOutcome;

fn parse_source(raw: &str) -> Result<Source, ApiError> {
    raw.parse().map_err(|_| ApiError::source_not_found(raw))
}

/// Kick off a run in the background. A start racing an active run gets the
/// sentinel outcome back instead of a second fetch loop.
pub async fn start_import(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<Json<ApiResponse<SyncOutcome>>, ApiError> {
    let source = parse_source(&source)?;
    let Some(runner) = state.shared.runner(source) else {
        return Err(ApiError::validation(format!(
            "Source '{source}' is not enabled"
        )));
    };

    if runner.is_running() {
        return Ok(Json(ApiResponse::success(SyncOutcome::already_running())));
    }

    let runner = Arc::clone(runner);
    tokio::spawn(async move {
        runner.start().await;
    });

    Ok(Json(ApiResponse::success(SyncOutcome::default())))
}

pub async fn pause_import(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let source = parse_source(&source)?;
    let Some(runner) = state.shared.runner(source) else {
        return Err(ApiError::validation(format!(
            "Source '{source}' is not enabled"
        )));
    };

    runner.pause().await?;
    Ok(Json(ApiResponse::success(format!(
        "Pause requested for {source}"
    ))))
}

pub async fn get_import_status(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<Json<ApiResponse<ImportStatusDto>>, ApiError> {
    let source = parse_source(&source)?;
    let status = state
        .shared
        .store
        .ensure_import_status(source.as_str())
        .await?;
    Ok(Json(ApiResponse::success(status.into())))
}

pub async fn list_import_statuses(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<ImportStatusDto>>>, ApiError> {
    let rows = state.shared.store.list_import_statuses().await?;
    Ok(Json(ApiResponse::success(
        rows.into_iter().map(Into::into).collect(),
    )))
}

/// Remove every record for a source and reset its status row, so the next
/// run starts over from phase 1, page 1.
pub async fn delete_source_data(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<Json<ApiResponse<DeleteSummaryDto>>, ApiError> {
    let source = parse_source(&source)?;

    if let Some(runner) = state.shared.runner(source) {
        if runner.is_running() {
            return Err(ApiError::Conflict(format!(
                "Import for '{source}' is running; pause it first"
            )));
        }
    }

    let deleted = state.shared.store.delete_by_source(source).await?;
    state
        .shared
        .store
        .ensure_import_status(source.as_str())
        .await?;
    state
        .shared
        .store
        .reset_import_status(source.as_str())
        .await?;

    Ok(Json(ApiResponse::success(DeleteSummaryDto {
        source: source.as_str().to_string(),
        deleted_records: deleted,
    })))
}
