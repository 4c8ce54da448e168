use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use crate::constants::rate;
use crate::domain::{ContentStatus, MediaType, Source};
use crate::models::content::{ContentRecord, EpisodeInfo};
use crate::services::rate_limit::RequestGate;

const JIKAN_API: &str = "https://api.jikan.moe/v4";

#[derive(Debug, Deserialize)]
struct JikanResponse<T> {
    data: T,
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    has_next_page: Option<bool>,
    items: Option<PaginationItems>,
}

#[derive(Debug, Deserialize)]
struct PaginationItems {
    total: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct MalAnime {
    pub mal_id: i32,
    pub title: String,
    pub title_english: Option<String>,
    pub episodes: Option<i32>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub anime_type: Option<String>,
    pub source: Option<String>,
    pub score: Option<f64>,
    pub scored_by: Option<i32>,
    pub members: Option<i64>,
    pub synopsis: Option<String>,
    pub duration: Option<String>,
    pub season: Option<String>,
    pub year: Option<i32>,
    pub broadcast: Option<Broadcast>,
    pub genres: Option<Vec<MalGenericInfo>>,
    pub themes: Option<Vec<MalGenericInfo>>,
    pub studios: Option<Vec<MalGenericInfo>>,
    pub images: Option<MalImages>,
    pub aired: Option<Aired>,
}

#[derive(Debug, Deserialize)]
pub struct Aired {
    pub from: Option<String>,
    pub to: Option<String>,
    pub prop: Option<AiredProp>,
}

#[derive(Debug, Deserialize)]
pub struct AiredProp {
    pub from: Option<AiredDate>,
    pub to: Option<AiredDate>,
}

#[derive(Debug, Deserialize)]
pub struct AiredDate {
    pub year: Option<i32>,
}

impl MalAnime {
    #[must_use]
    pub fn get_start_year(&self) -> Option<i32> {
        if let Some(year) = self.year {
            return Some(year);
        }

        self.aired
            .as_ref()
            .and_then(|a| a.prop.as_ref())
            .and_then(|p| p.from.as_ref())
            .and_then(|f| f.year)
    }

    #[must_use]
    pub fn get_end_year(&self) -> Option<i32> {
        self.aired
            .as_ref()
            .and_then(|a| a.prop.as_ref())
            .and_then(|p| p.to.as_ref())
            .and_then(|t| t.year)
    }
}

#[derive(Debug, Deserialize)]
pub struct MalGenericInfo {
    pub mal_id: i32,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct Broadcast {
    pub day: Option<String>,
    pub time: Option<String>,
    pub string: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MalImages {
    pub jpg: Option<MalImageSet>,
}

#[derive(Debug, Deserialize)]
pub struct MalImageSet {
    pub image_url: Option<String>,
    pub large_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MalEpisode {
    pub mal_id: i32,
    pub title: Option<String>,
    pub aired: Option<String>,
    pub score: Option<f64>,
    #[serde(default)]
    pub filler: bool,
    #[serde(default)]
    pub recap: bool,
}

/// One page of results plus whether more pages follow.
#[derive(Debug)]
pub struct JikanPage<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
    pub total_items: Option<i32>,
}

#[derive(Clone)]
pub struct JikanClient {
    client: Client,
    gate: Arc<RequestGate>,
}

impl JikanClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            gate: Arc::new(RequestGate::new(
                "jikan",
                rate::JIKAN_LIMIT,
                rate::JIKAN_WINDOW,
            )),
        }
    }

    async fn fetch_page_of(&self, url: &str) -> Result<JikanPage<MalAnime>> {
        self.gate.acquire().await;
        let response = self.client.get(url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(JikanPage {
                items: Vec::new(),
                has_next_page: false,
                total_items: None,
            });
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Jikan API error: {} - {}", status, body));
        }

        let response: JikanResponse<Vec<MalAnime>> = response.json().await?;
        let pagination = response.pagination;
        Ok(JikanPage {
            items: response.data,
            has_next_page: pagination
                .as_ref()
                .and_then(|p| p.has_next_page)
                .unwrap_or(false),
            total_items: pagination
                .and_then(|p| p.items)
                .and_then(|i| i.total),
        })
    }

    /// One page of the full anime index, ordered by MAL id for a stable
    /// walk.
    pub async fn list_page(&self, page: u32) -> Result<JikanPage<MalAnime>> {
        let url = format!("{JIKAN_API}/anime?page={page}&order_by=mal_id&sort=asc");
        self.fetch_page_of(&url).await
    }

    pub async fn top_page(&self, page: u32) -> Result<JikanPage<MalAnime>> {
        let url = format!("{JIKAN_API}/top/anime?page={page}");
        self.fetch_page_of(&url).await
    }

    pub async fn season_page(&self, year: i32, season: &str, page: u32) -> Result<JikanPage<MalAnime>> {
        let url = format!("{JIKAN_API}/seasons/{year}/{season}?page={page}");
        self.fetch_page_of(&url).await
    }

    pub async fn get_anime(&self, mal_id: i32) -> Result<Option<MalAnime>> {
        self.gate.acquire().await;
        let url = format!("{JIKAN_API}/anime/{mal_id}");
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Jikan API error: {} - {}", status, body));
        }

        let response: JikanResponse<MalAnime> = response.json().await?;
        Ok(Some(response.data))
    }

    pub async fn get_episodes(&self, mal_id: i32, page: u32) -> Result<JikanPage<MalEpisode>> {
        self.gate.acquire().await;
        let url = format!("{JIKAN_API}/anime/{mal_id}/episodes?page={page}");
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(JikanPage {
                items: Vec::new(),
                has_next_page: false,
                total_items: None,
            });
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Jikan API error: {} - {}", status, body));
        }

        let response: JikanResponse<Vec<MalEpisode>> = response.json().await?;
        let has_next_page = response
            .pagination
            .as_ref()
            .and_then(|p| p.has_next_page)
            .unwrap_or(false);
        Ok(JikanPage {
            items: response.data,
            has_next_page,
            total_items: None,
        })
    }

    pub async fn search(&self, query: &str, page: u32) -> Result<JikanPage<MalAnime>> {
        let url = format!(
            "{JIKAN_API}/anime?q={}&page={page}",
            urlencoding::encode(query)
        );
        self.fetch_page_of(&url).await
    }
}

#[must_use]
pub fn map_status(raw: &str) -> Option<ContentStatus> {
    match raw {
        "Currently Airing" => Some(ContentStatus::Airing),
        "Finished Airing" => Some(ContentStatus::Completed),
        "Not yet aired" => Some(ContentStatus::Upcoming),
        _ => None,
    }
}

#[must_use]
pub fn to_content_record(anime: &MalAnime) -> ContentRecord {
    let mut record = ContentRecord::new(
        Source::Jikan,
        anime.mal_id.to_string(),
        anime.title.clone(),
        MediaType::Anime,
    );

    record.overview = anime.synopsis.as_deref().and_then(super::strip_html);
    record.genres = names(&anime.genres);
    record.tags = names(&anime.themes);
    record.studio = anime
        .studios
        .as_ref()
        .and_then(|s| s.first())
        .map(|s| s.name.clone());
    record.source_material = anime.source.clone();
    record.poster_url = anime.images.as_ref().and_then(|i| {
        i.jpg
            .as_ref()
            .and_then(|j| j.large_image_url.clone().or_else(|| j.image_url.clone()))
    });
    record.popularity = anime.members.map(|m| m as f64);
    record.year = anime.get_start_year();
    record.end_year = anime.get_end_year();
    record.release_date = anime.aired.as_ref().and_then(|a| a.from.clone());
    record.status = anime.status.as_deref().and_then(map_status);
    record.total_episodes = anime.episodes;
    record.season = anime.season.clone();
    record.runtime = anime.duration.as_deref().and_then(parse_duration_minutes);
    record.rating = anime.score;
    record.mal_rating = anime.score;

    if let Some(broadcast) = &anime.broadcast {
        record.air_time = broadcast.time.clone();
        record.air_days = broadcast.day.iter().cloned().collect();
    }

    record
}

/// Attach a fetched episode list, normalizing MAL's field names onto the
/// unified `number`/`airdate` shape.
pub fn attach_episodes(record: &mut ContentRecord, episodes: &[MalEpisode]) {
    record.episode_data = episodes
        .iter()
        .enumerate()
        .map(|(index, e)| EpisodeInfo {
            id: Some(i64::from(e.mal_id)),
            title: e.title.clone(),
            season: None,
            number: index as i32 + 1,
            airdate: e.aired.clone(),
            summary: None,
            score: e.score,
            filler: Some(e.filler),
            recap: Some(e.recap),
        })
        .collect();
    if record.total_episodes.is_none() {
        record.total_episodes = Some(record.episode_data.len() as i32);
    }
}

fn names(infos: &Option<Vec<MalGenericInfo>>) -> Vec<String> {
    infos
        .as_ref()
        .map(|list| list.iter().map(|i| i.name.clone()).collect())
        .unwrap_or_default()
}

fn parse_duration_minutes(raw: &str) -> Option<i32> {
    // "24 min per ep" / "1 hr 55 min"
    let mut minutes = 0;
    let mut tokens = raw.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        if let Ok(value) = token.parse::<i32>() {
            match tokens.peek().copied() {
                Some("hr") | Some("hr.") => minutes += value * 60,
                Some("min") | Some("min.") => minutes += value,
                _ => {}
            }
        }
    }
    if minutes > 0 { Some(minutes) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_native_status() {
        assert_eq!(map_status("Currently Airing"), Some(ContentStatus::Airing));
        assert_eq!(
            map_status("Finished Airing"),
            Some(ContentStatus::Completed)
        );
        assert_eq!(map_status("Not yet aired"), Some(ContentStatus::Upcoming));
        assert_eq!(map_status("On Hiatus"), None);
    }

    #[test]
    fn parses_episode_durations() {
        assert_eq!(parse_duration_minutes("24 min per ep"), Some(24));
        assert_eq!(parse_duration_minutes("1 hr 55 min"), Some(115));
        assert_eq!(parse_duration_minutes("Unknown"), None);
    }

    #[test]
    fn converts_anime_and_normalizes_episode_fields() {
        let json = serde_json::json!({
            "mal_id": 52991,
            "title": "Sousou no Frieren",
            "title_english": "Frieren: Beyond Journey's End",
            "episodes": 28,
            "status": "Finished Airing",
            "type": "TV",
            "source": "Manga",
            "score": 9.3,
            "scored_by": 500000,
            "members": 1200000,
            "synopsis": "During their decade-long quest...",
            "duration": "24 min per ep",
            "season": "fall",
            "year": 2023,
            "broadcast": { "day": "Fridays", "time": "23:00", "string": "Fridays at 23:00 (JST)" },
            "genres": [{ "mal_id": 2, "name": "Adventure" }],
            "themes": [{ "mal_id": 50, "name": "Fantasy" }],
            "studios": [{ "mal_id": 11, "name": "Madhouse" }],
            "aired": { "from": "2023-09-29T00:00:00+00:00", "to": "2024-03-22T00:00:00+00:00",
                       "prop": { "from": { "year": 2023 }, "to": { "year": 2024 } } }
        });
        let anime: MalAnime = serde_json::from_value(json).unwrap();
        let mut record = to_content_record(&anime);

        assert_eq!(record.key(), (Source::Jikan, "52991"));
        assert_eq!(record.media_type, MediaType::Anime);
        assert_eq!(record.status, Some(ContentStatus::Completed));
        assert_eq!(record.year, Some(2023));
        assert_eq!(record.end_year, Some(2024));
        assert_eq!(record.studio.as_deref(), Some("Madhouse"));
        assert_eq!(record.source_material.as_deref(), Some("Manga"));
        assert_eq!(record.mal_rating, Some(9.3));
        assert_eq!(record.runtime, Some(24));
        assert_eq!(record.air_days, vec!["Fridays".to_string()]);

        let episodes = vec![
            MalEpisode {
                mal_id: 1,
                title: Some("The Journey's End".to_string()),
                aired: Some("2023-09-29T00:00:00+00:00".to_string()),
                score: Some(4.6),
                filler: false,
                recap: false,
            },
            MalEpisode {
                mal_id: 2,
                title: None,
                aired: None,
                score: None,
                filler: true,
                recap: false,
            },
        ];
        attach_episodes(&mut record, &episodes);

        assert_eq!(record.episode_data.len(), 2);
        assert_eq!(record.episode_data[0].number, 1);
        assert_eq!(
            record.episode_data[0].airdate.as_deref(),
            Some("2023-09-29T00:00:00+00:00")
        );
        assert_eq!(record.episode_data[1].filler, Some(true));
    }
}
