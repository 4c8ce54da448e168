use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, ContentSummaryDto};
use crate::db::ContentFilter;
use crate::models::content::ContentRecord;

#[derive(Debug, Deserialize)]
pub struct ContentQuery {
    pub source: Option<String>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

const fn default_page_size() -> u64 {
    50
}

pub async fn list_content(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<ApiResponse<Vec<ContentSummaryDto>>>, ApiError> {
    let filter = ContentFilter {
        source: query
            .source
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|_| ApiError::validation("Unknown source filter"))?,
        media_type: query
            .media_type
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|_| ApiError::validation("Unknown media type filter"))?,
        status: query
            .status
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|_| ApiError::validation("Unknown status filter"))?,
        page: query.page,
        page_size: query.page_size,
    };

    let records = state.shared.store.list_content(&filter).await?;
    Ok(Json(ApiResponse::success(
        records.iter().map(ContentSummaryDto::from).collect(),
    )))
}

/// Full record including the embedded episode list.
pub async fn get_content(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ContentRecord>>, ApiError> {
    let record = state
        .shared
        .store
        .get_content(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Content {id} not found")))?;
    Ok(Json(ApiResponse::success(record)))
}
