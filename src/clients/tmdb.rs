use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use crate::constants::rate;
use crate::domain::{ContentStatus, MediaType, Source};
use crate::models::content::ContentRecord;
use crate::services::rate_limit::RequestGate;

const TMDB_API: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

#[derive(Debug, Deserialize)]
pub struct TmdbPage<T> {
    pub page: u32,
    pub results: Vec<T>,
    pub total_pages: u32,
    pub total_results: i32,
}

/// Movie shape shared by list and detail endpoints; detail-only fields are
/// optional and absent on list results.
#[derive(Debug, Deserialize)]
pub struct TmdbMovie {
    pub id: i64,
    pub title: String,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub popularity: Option<f64>,
    pub vote_average: Option<f64>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub status: Option<String>,
    pub runtime: Option<i32>,
    pub genres: Option<Vec<TmdbGenre>>,
    pub imdb_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TmdbGenre {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TmdbExternalIds {
    pub imdb_id: Option<String>,
}

pub struct TmdbClient {
    client: Client,
    api_key: String,
    gate: Arc<RequestGate>,
}

impl TmdbClient {
    #[must_use]
    pub fn new(client: Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            gate: Arc::new(RequestGate::new("tmdb", rate::TMDB_LIMIT, rate::TMDB_WINDOW)),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, &str)],
    ) -> Result<Option<T>> {
        self.gate.acquire().await;
        let url = format!("{TMDB_API}{path}");
        let mut request = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())]);
        for (key, value) in extra {
            request = request.query(&[(*key, *value)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(super::redact(&e.to_string(), &self.api_key)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "TMDB API error: {} - {}",
                status,
                super::redact(&body, &self.api_key)
            ));
        }

        Ok(Some(response.json().await?))
    }

    /// One page of the popular-movies list (1-based). Pages past
    /// `total_pages` come back empty.
    pub async fn popular_page(&self, page: u32) -> Result<TmdbPage<TmdbMovie>> {
        let page_param = page.to_string();
        let result: Option<TmdbPage<TmdbMovie>> = self
            .get_json("/movie/popular", &[("page", page_param.as_str())])
            .await?;
        result.ok_or_else(|| anyhow::anyhow!("TMDB popular page {page} missing"))
    }

    pub async fn get_movie(&self, id: i64) -> Result<Option<TmdbMovie>> {
        self.get_json(&format!("/movie/{id}"), &[]).await
    }

    pub async fn external_ids(&self, id: i64) -> Result<Option<TmdbExternalIds>> {
        self.get_json(&format!("/movie/{id}/external_ids"), &[])
            .await
    }

    pub async fn search(&self, query: &str, page: u32) -> Result<TmdbPage<TmdbMovie>> {
        let page_param = page.to_string();
        let result: Option<TmdbPage<TmdbMovie>> = self
            .get_json(
                "/search/movie",
                &[("query", query), ("page", page_param.as_str())],
            )
            .await?;
        result.ok_or_else(|| anyhow::anyhow!("TMDB search page missing"))
    }
}

/// TMDB movie status vocabulary onto the unified enum. Everything still in
/// the production pipeline is "upcoming" from a viewer's perspective.
#[must_use]
pub fn map_status(raw: &str) -> Option<ContentStatus> {
    match raw {
        "Released" => Some(ContentStatus::Released),
        "Canceled" => Some(ContentStatus::Cancelled),
        "Rumored" | "Planned" | "In Production" | "Post Production" => {
            Some(ContentStatus::Upcoming)
        }
        _ => None,
    }
}

#[must_use]
pub fn to_content_record(movie: &TmdbMovie) -> ContentRecord {
    let mut record = ContentRecord::new(
        Source::Tmdb,
        movie.id.to_string(),
        movie.title.clone(),
        MediaType::Movie,
    );

    record.overview = movie
        .overview
        .clone()
        .filter(|o| !o.trim().is_empty());
    record.genres = movie
        .genres
        .as_ref()
        .map(|g| g.iter().map(|g| g.name.clone()).collect())
        .unwrap_or_default();
    record.poster_url = movie
        .poster_path
        .as_ref()
        .map(|p| format!("{TMDB_IMAGE_BASE}{p}"));
    record.backdrop_url = movie
        .backdrop_path
        .as_ref()
        .map(|p| format!("{TMDB_IMAGE_BASE}{p}"));
    record.popularity = movie.popularity;
    record.year = movie
        .release_date
        .as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse().ok());
    record.release_date = movie.release_date.clone().filter(|d| !d.is_empty());
    // List results carry no status field; a non-empty release date in the
    // past is the best signal available there.
    record.status = match movie.status.as_deref() {
        Some(raw) => map_status(raw),
        None => record.release_date.as_ref().map(|_| ContentStatus::Released),
    };
    record.runtime = movie.runtime;
    record.rating = movie.vote_average;

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_native_status() {
        assert_eq!(map_status("Released"), Some(ContentStatus::Released));
        assert_eq!(map_status("Canceled"), Some(ContentStatus::Cancelled));
        assert_eq!(map_status("In Production"), Some(ContentStatus::Upcoming));
        assert_eq!(map_status("Post Production"), Some(ContentStatus::Upcoming));
        assert_eq!(map_status("Planned"), Some(ContentStatus::Upcoming));
        assert_eq!(map_status("Rumored"), Some(ContentStatus::Upcoming));
        assert_eq!(map_status("Whatever"), None);
    }

    #[test]
    fn converts_detail_movie() {
        let json = serde_json::json!({
            "id": 27205,
            "title": "Inception",
            "overview": "Cobb, a skilled thief...",
            "release_date": "2010-07-15",
            "popularity": 83.5,
            "vote_average": 8.4,
            "poster_path": "/poster.jpg",
            "backdrop_path": "/backdrop.jpg",
            "status": "Released",
            "runtime": 148,
            "genres": [{ "id": 28, "name": "Action" }, { "id": 878, "name": "Science Fiction" }],
            "imdb_id": "tt1375666"
        });
        let movie: TmdbMovie = serde_json::from_value(json).unwrap();
        let record = to_content_record(&movie);

        assert_eq!(record.key(), (Source::Tmdb, "27205"));
        assert_eq!(record.media_type, MediaType::Movie);
        assert_eq!(record.status, Some(ContentStatus::Released));
        assert_eq!(record.year, Some(2010));
        assert_eq!(record.runtime, Some(148));
        assert_eq!(
            record.poster_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/poster.jpg")
        );
        assert_eq!(record.genres, vec!["Action", "Science Fiction"]);
        assert_eq!(movie.imdb_id.as_deref(), Some("tt1375666"));
    }

    #[test]
    fn list_result_with_past_date_counts_as_released() {
        let json = serde_json::json!({
            "id": 1,
            "title": "Some Movie",
            "release_date": "1999-10-15"
        });
        let movie: TmdbMovie = serde_json::from_value(json).unwrap();
        let record = to_content_record(&movie);
        assert_eq!(record.status, Some(ContentStatus::Released));
    }
}
