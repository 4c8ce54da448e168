use axum::{Json, extract::State};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::domain::Source;
use crate::services::scheduler::SchedulerSnapshot;

#[derive(Debug, Serialize)]
pub struct SystemStatusDto {
    pub version: String,
    pub uptime_seconds: u64,
    pub database_ok: bool,
    pub records_by_source: HashMap<String, u64>,
    pub scheduler: SchedulerSnapshot,
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SystemStatusDto>>, ApiError> {
    let database_ok = state.shared.store.ping().await.is_ok();

    let mut records_by_source = HashMap::new();
    for source in Source::CATALOGS {
        let count = state.shared.store.count_by_source(source).await?;
        records_by_source.insert(source.as_str().to_string(), count);
    }

    Ok(Json(ApiResponse::success(SystemStatusDto {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        database_ok,
        records_by_source,
        scheduler: state.shared.sync_manager.snapshot().await,
    })))
}

pub async fn get_scheduler_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SchedulerSnapshot>>, ApiError> {
    Ok(Json(ApiResponse::success(
        state.shared.sync_manager.snapshot().await,
    )))
}
