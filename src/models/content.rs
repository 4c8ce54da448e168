use serde::{Deserialize, Serialize};

use crate::domain::{ContentStatus, MediaType, Source};

/// The unified catalog entity. Identity is `(source, source_id)`; the
/// surrogate `id` is assigned by the store on first insert.
///
/// Catalog fields are owned by the import pipeline; the rating fields
/// (`imdb_rating`, `vote_count`, `rotten_tomatoes_rating`, `imdb_checked_at`)
/// are owned by the enrichment path and preserved across catalog overwrites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: Option<i32>,
    pub source: Source,
    pub source_id: String,
    pub title: String,
    pub media_type: MediaType,

    pub overview: Option<String>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub popularity: Option<f64>,

    pub year: Option<i32>,
    pub end_year: Option<i32>,
    pub release_date: Option<String>,
    pub status: Option<ContentStatus>,

    pub total_seasons: Option<i32>,
    pub total_episodes: Option<i32>,
    pub season: Option<String>,
    pub network: Option<String>,
    pub air_time: Option<String>,
    pub air_days: Vec<String>,
    pub studio: Option<String>,
    pub source_material: Option<String>,
    pub runtime: Option<i32>,
    pub episode_data: Vec<EpisodeInfo>,

    pub rating: Option<f64>,
    pub mal_rating: Option<f64>,
    pub imdb_rating: Option<f64>,
    pub imdb_id: Option<String>,
    pub vote_count: Option<i32>,
    pub rotten_tomatoes_rating: Option<String>,
    pub imdb_checked_at: Option<String>,

    pub created_at: Option<String>,
    pub last_updated: Option<String>,
}

impl ContentRecord {
    /// Bare record with identity fields set; everything else empty.
    #[must_use]
    pub fn new(
        source: Source,
        source_id: impl Into<String>,
        title: impl Into<String>,
        media_type: MediaType,
    ) -> Self {
        Self {
            id: None,
            source,
            source_id: source_id.into(),
            title: title.into(),
            media_type,
            overview: None,
            genres: Vec::new(),
            tags: Vec::new(),
            poster_url: None,
            backdrop_url: None,
            popularity: None,
            year: None,
            end_year: None,
            release_date: None,
            status: None,
            total_seasons: None,
            total_episodes: None,
            season: None,
            network: None,
            air_time: None,
            air_days: Vec::new(),
            studio: None,
            source_material: None,
            runtime: None,
            episode_data: Vec::new(),
            rating: None,
            mal_rating: None,
            imdb_rating: None,
            imdb_id: None,
            vote_count: None,
            rotten_tomatoes_rating: None,
            imdb_checked_at: None,
            created_at: None,
            last_updated: None,
        }
    }

    /// The dedupe key identifying this record across runs.
    #[must_use]
    pub fn key(&self) -> (Source, &str) {
        (self.source, &self.source_id)
    }
}

/// One episode of a series, with field names normalized across providers
/// (`number`, `airdate`) so schedule and episode views never branch on
/// source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub season: Option<i32>,
    pub number: i32,
    pub airdate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filler: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recap: Option<bool>,
}

/// Narrow field-scoped update applied by the enrichment path. Only the
/// rating columns are touched so catalog writes and rating writes stay on
/// disjoint field sets.
#[derive(Debug, Clone, Default)]
pub struct RatingPatch {
    pub imdb_id: Option<String>,
    pub imdb_rating: Option<f64>,
    pub vote_count: Option<i32>,
    pub rotten_tomatoes_rating: Option<String>,
    pub imdb_checked_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn episode_info_serializes_normalized_names() {
        let episode = EpisodeInfo {
            id: Some(42),
            title: Some("Pilot".to_string()),
            season: Some(1),
            number: 1,
            airdate: Some("2013-06-24".to_string()),
            summary: None,
            score: None,
            filler: Some(false),
            recap: None,
        };

        let json = serde_json::to_value(&episode).unwrap();
        assert_eq!(json["number"], 1);
        assert_eq!(json["airdate"], "2013-06-24");
        assert!(json.get("summary").is_none());
    }

    #[test]
    fn record_key_is_source_and_source_id() {
        let record = ContentRecord::new(Source::Tvmaze, "82", "Game of Thrones", MediaType::Tv);
        assert_eq!(record.key(), (Source::Tvmaze, "82"));
    }
}
