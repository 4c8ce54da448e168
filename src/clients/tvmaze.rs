use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use crate::constants::rate;
use crate::domain::{ContentStatus, MediaType, Source};
use crate::models::content::{ContentRecord, EpisodeInfo};
use crate::services::rate_limit::RequestGate;

const TVMAZE_API: &str = "https://api.tvmaze.com";

#[derive(Debug, Deserialize)]
pub struct TvMazeShow {
    pub id: i64,
    pub name: String,
    pub genres: Option<Vec<String>>,
    pub status: Option<String>,
    pub runtime: Option<i32>,
    #[serde(rename = "averageRuntime")]
    pub average_runtime: Option<i32>,
    pub premiered: Option<String>,
    pub ended: Option<String>,
    pub schedule: Option<Schedule>,
    pub rating: Option<ShowRating>,
    pub weight: Option<i32>,
    pub network: Option<NetworkInfo>,
    #[serde(rename = "webChannel")]
    pub web_channel: Option<NetworkInfo>,
    pub externals: Option<Externals>,
    pub image: Option<ShowImage>,
    pub summary: Option<String>,
    #[serde(rename = "_embedded")]
    pub embedded: Option<Embedded>,
}

#[derive(Debug, Deserialize)]
pub struct Schedule {
    pub time: Option<String>,
    pub days: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ShowRating {
    pub average: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct NetworkInfo {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct Externals {
    pub imdb: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShowImage {
    pub medium: Option<String>,
    pub original: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Embedded {
    pub episodes: Option<Vec<TvMazeEpisode>>,
}

#[derive(Debug, Deserialize)]
pub struct TvMazeEpisode {
    pub id: i64,
    pub name: Option<String>,
    pub season: i32,
    pub number: Option<i32>,
    pub airdate: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    show: TvMazeShow,
}

impl TvMazeShow {
    #[must_use]
    pub fn imdb_id(&self) -> Option<String> {
        self.externals.as_ref().and_then(|e| e.imdb.clone())
    }
}

#[derive(Clone)]
pub struct TvmazeClient {
    client: Client,
    gate: Arc<RequestGate>,
}

impl TvmazeClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            gate: Arc::new(RequestGate::new(
                "tvmaze",
                rate::TVMAZE_LIMIT,
                rate::TVMAZE_WINDOW,
            )),
        }
    }

    /// One page of the full show index. TVmaze pages are 0-based and a 404
    /// past the last page is the catalog-exhausted signal, surfaced here as
    /// an empty vec.
    pub async fn fetch_index_page(&self, page: u32) -> Result<Vec<TvMazeShow>> {
        self.gate.acquire().await;
        let url = format!("{TVMAZE_API}/shows?page={page}");
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("TVmaze API error: {} - {}", status, body));
        }

        Ok(response.json().await?)
    }

    pub async fn get_show(&self, id: i64) -> Result<Option<TvMazeShow>> {
        self.gate.acquire().await;
        let url = format!("{TVMAZE_API}/shows/{id}?embed=episodes");
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("TVmaze API error: {} - {}", status, body));
        }

        Ok(Some(response.json().await?))
    }

    pub async fn lookup_by_imdb(&self, imdb_id: &str) -> Result<Option<TvMazeShow>> {
        self.gate.acquire().await;
        let url = format!(
            "{TVMAZE_API}/lookup/shows?imdb={}",
            urlencoding::encode(imdb_id)
        );
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow::anyhow!("TVmaze API error: {status}"));
        }

        Ok(Some(response.json().await?))
    }

    pub async fn search(&self, query: &str) -> Result<Vec<TvMazeShow>> {
        self.gate.acquire().await;
        let url = format!(
            "{TVMAZE_API}/search/shows?q={}",
            urlencoding::encode(query)
        );
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("TVmaze API error: {} - {}", status, body));
        }

        let hits: Vec<SearchHit> = response.json().await?;
        Ok(hits.into_iter().map(|h| h.show).collect())
    }
}

#[must_use]
pub fn map_status(raw: &str) -> Option<ContentStatus> {
    match raw {
        "Running" => Some(ContentStatus::Airing),
        "Ended" => Some(ContentStatus::Completed),
        "To Be Determined" | "In Development" => Some(ContentStatus::Upcoming),
        _ => None,
    }
}

/// Map a TVmaze show onto the unified record. Conversion is pure: the IMDb
/// id is surfaced via [`TvMazeShow::imdb_id`] and any enrichment happens in
/// a separate step.
#[must_use]
pub fn to_content_record(show: &TvMazeShow) -> ContentRecord {
    let mut record = ContentRecord::new(
        Source::Tvmaze,
        show.id.to_string(),
        show.name.clone(),
        MediaType::Tv,
    );

    record.overview = show.summary.as_deref().and_then(super::strip_html);
    record.genres = show.genres.clone().unwrap_or_default();
    record.poster_url = show
        .image
        .as_ref()
        .and_then(|i| i.original.clone().or_else(|| i.medium.clone()));
    record.popularity = show.weight.map(f64::from);
    record.year = show.premiered.as_deref().and_then(parse_year);
    record.end_year = show.ended.as_deref().and_then(parse_year);
    record.release_date = show.premiered.clone();
    record.status = show.status.as_deref().and_then(map_status);
    record.runtime = show.runtime.or(show.average_runtime);
    record.network = show
        .network
        .as_ref()
        .or(show.web_channel.as_ref())
        .map(|n| n.name.clone());
    record.rating = show.rating.as_ref().and_then(|r| r.average);

    if let Some(schedule) = &show.schedule {
        record.air_time = schedule.time.clone().filter(|t| !t.is_empty());
        record.air_days = schedule.days.clone().unwrap_or_default();
    }

    if let Some(episodes) = show.embedded.as_ref().and_then(|e| e.episodes.as_ref()) {
        record.total_episodes = Some(episodes.len() as i32);
        record.total_seasons = episodes.iter().map(|e| e.season).max();
        record.episode_data = episodes
            .iter()
            .map(|e| EpisodeInfo {
                id: Some(e.id),
                title: e.name.clone(),
                season: Some(e.season),
                number: e.number.unwrap_or(0),
                airdate: e.airdate.clone().filter(|d| !d.is_empty()),
                summary: e.summary.as_deref().and_then(super::strip_html),
                score: None,
                filler: None,
                recap: None,
            })
            .collect();
    }

    record
}

fn parse_year(date: &str) -> Option<i32> {
    date.get(..4).and_then(|y| y.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_native_status() {
        assert_eq!(map_status("Running"), Some(ContentStatus::Airing));
        assert_eq!(map_status("Ended"), Some(ContentStatus::Completed));
        assert_eq!(
            map_status("To Be Determined"),
            Some(ContentStatus::Upcoming)
        );
        assert_eq!(map_status("In Development"), Some(ContentStatus::Upcoming));
        assert_eq!(map_status("Something Else"), None);
    }

    #[test]
    fn converts_show_with_embedded_episodes() {
        let json = serde_json::json!({
            "id": 82,
            "name": "Game of Thrones",
            "genres": ["Drama", "Adventure"],
            "status": "Ended",
            "runtime": 60,
            "premiered": "2011-04-17",
            "ended": "2019-05-19",
            "schedule": { "time": "21:00", "days": ["Sunday"] },
            "rating": { "average": 8.9 },
            "weight": 99,
            "network": { "name": "HBO" },
            "externals": { "imdb": "tt0944947" },
            "image": { "medium": "http://img/m.jpg", "original": "http://img/o.jpg" },
            "summary": "<p>Seven noble families fight.</p>",
            "_embedded": {
                "episodes": [
                    { "id": 1, "name": "Winter Is Coming", "season": 1, "number": 1,
                      "airdate": "2011-04-17", "summary": "<p>Pilot.</p>" },
                    { "id": 2, "name": "The Kingsroad", "season": 1, "number": 2,
                      "airdate": "2011-04-24", "summary": null }
                ]
            }
        });
        let show: TvMazeShow = serde_json::from_value(json).unwrap();
        let record = to_content_record(&show);

        assert_eq!(record.key(), (Source::Tvmaze, "82"));
        assert_eq!(record.media_type, MediaType::Tv);
        assert_eq!(record.status, Some(ContentStatus::Completed));
        assert_eq!(record.year, Some(2011));
        assert_eq!(record.end_year, Some(2019));
        assert_eq!(record.network.as_deref(), Some("HBO"));
        assert_eq!(record.air_days, vec!["Sunday".to_string()]);
        assert_eq!(
            record.overview.as_deref(),
            Some("Seven noble families fight.")
        );
        assert_eq!(record.total_episodes, Some(2));
        assert_eq!(record.total_seasons, Some(1));
        assert_eq!(record.episode_data[0].number, 1);
        assert_eq!(record.episode_data[0].airdate.as_deref(), Some("2011-04-17"));
        assert_eq!(show.imdb_id().as_deref(), Some("tt0944947"));
        assert!(record.imdb_rating.is_none());
    }

    #[test]
    fn falls_back_to_web_channel_network() {
        let json = serde_json::json!({
            "id": 7,
            "name": "Streamer Original",
            "status": "Running",
            "network": null,
            "webChannel": { "name": "Netflix" }
        });
        let show: TvMazeShow = serde_json::from_value(json).unwrap();
        let record = to_content_record(&show);
        assert_eq!(record.network.as_deref(), Some("Netflix"));
    }
}
