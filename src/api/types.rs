use serde::Serialize;

use crate::db::ImportStatusRow;
use crate::models::content::ContentRecord;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImportStatusDto {
    pub source: String,
    pub is_active: bool,
    pub current_page: i32,
    pub total_imported: i32,
    pub total_available: Option<i32>,
    pub phase1_progress: Option<String>,
    pub phase2_progress: Option<String>,
    pub phase3_progress: Option<String>,
    pub errors: Vec<String>,
    pub last_sync_at: Option<String>,
    pub updated_at: String,
}

impl From<ImportStatusRow> for ImportStatusDto {
    fn from(row: ImportStatusRow) -> Self {
        Self {
            source: row.source,
            is_active: row.is_active,
            current_page: row.current_page,
            total_imported: row.total_imported,
            total_available: row.total_available,
            phase1_progress: row.phase1_progress,
            phase2_progress: row.phase2_progress,
            phase3_progress: row.phase3_progress,
            errors: row.errors,
            last_sync_at: row.last_sync_at,
            updated_at: row.updated_at,
        }
    }
}

/// Listing shape for the browse endpoint; episode payloads are detail-only.
#[derive(Debug, Serialize)]
pub struct ContentSummaryDto {
    pub id: Option<i32>,
    pub source: String,
    pub source_id: String,
    pub title: String,
    pub media_type: String,
    pub year: Option<i32>,
    pub status: Option<String>,
    pub genres: Vec<String>,
    pub poster_url: Option<String>,
    pub popularity: Option<f64>,
    pub rating: Option<f64>,
    pub imdb_rating: Option<f64>,
    pub total_episodes: Option<i32>,
}

impl From<&ContentRecord> for ContentSummaryDto {
    fn from(record: &ContentRecord) -> Self {
        Self {
            id: record.id,
            source: record.source.as_str().to_string(),
            source_id: record.source_id.clone(),
            title: record.title.clone(),
            media_type: record.media_type.as_str().to_string(),
            year: record.year,
            status: record.status.map(|s| s.as_str().to_string()),
            genres: record.genres.clone(),
            poster_url: record.poster_url.clone(),
            popularity: record.popularity,
            rating: record.rating,
            imdb_rating: record.imdb_rating,
            total_episodes: record.total_episodes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteSummaryDto {
    pub source: String,
    pub deleted_records: u64,
}
