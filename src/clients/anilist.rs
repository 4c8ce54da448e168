use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::constants::rate;
use crate::domain::{ContentStatus, MediaType, Source};
use crate::models::content::ContentRecord;
use crate::services::rate_limit::RequestGate;

const ANILIST_API: &str = "https://graphql.anilist.co";

const MEDIA_FIELDS: &str = r"
    id
    title { romaji english native }
    format
    episodes
    duration
    status
    season
    seasonYear
    startDate { year }
    endDate { year }
    description(asHtml: false)
    averageScore
    popularity
    genres
    tags { name }
    coverImage { extraLarge large }
    bannerImage
    source
    studios(isMain: true) { nodes { name isAnimationStudio } }
";

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: serde_json::Value,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<Data>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct Data {
    #[serde(rename = "Page")]
    page: Option<Page>,
    #[serde(rename = "Media")]
    media: Option<Media>,
}

#[derive(Deserialize)]
struct Page {
    #[serde(rename = "pageInfo")]
    page_info: Option<PageInfo>,
    media: Vec<Media>,
}

#[derive(Deserialize)]
struct PageInfo {
    #[serde(rename = "hasNextPage")]
    has_next_page: Option<bool>,
    total: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct Media {
    pub id: i32,
    pub title: Title,
    pub format: Option<String>,
    pub episodes: Option<i32>,
    pub duration: Option<i32>,
    pub status: Option<String>,
    pub season: Option<String>,
    #[serde(rename = "seasonYear")]
    pub season_year: Option<i32>,
    #[serde(rename = "startDate")]
    pub start_date: Option<FuzzyDate>,
    #[serde(rename = "endDate")]
    pub end_date: Option<FuzzyDate>,
    pub description: Option<String>,
    #[serde(rename = "averageScore")]
    pub average_score: Option<i32>,
    pub popularity: Option<i32>,
    pub genres: Option<Vec<String>>,
    pub tags: Option<Vec<MediaTag>>,
    #[serde(rename = "coverImage")]
    pub cover_image: Option<CoverImage>,
    #[serde(rename = "bannerImage")]
    pub banner_image: Option<String>,
    pub source: Option<String>,
    pub studios: Option<Studios>,
}

#[derive(Debug, Deserialize)]
pub struct Title {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FuzzyDate {
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct MediaTag {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CoverImage {
    #[serde(rename = "extraLarge")]
    pub extra_large: Option<String>,
    pub large: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Studios {
    pub nodes: Vec<StudioNode>,
}

#[derive(Debug, Deserialize)]
pub struct StudioNode {
    pub name: String,
    #[serde(rename = "isAnimationStudio")]
    pub is_animation_studio: bool,
}

/// One page of media plus the paginator's own next-page signal.
#[derive(Debug)]
pub struct MediaPage {
    pub media: Vec<Media>,
    pub has_next_page: bool,
    pub total: Option<i32>,
}

#[derive(Clone)]
pub struct AnilistClient {
    client: Client,
    gate: Arc<RequestGate>,
}

impl AnilistClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            gate: Arc::new(RequestGate::new(
                "anilist",
                rate::ANILIST_LIMIT,
                rate::ANILIST_WINDOW,
            )),
        }
    }

    async fn post(&self, query: &str, variables: serde_json::Value) -> Result<Data> {
        self.gate.acquire().await;

        let request_body = GraphQlRequest { query, variables };
        let response = self
            .client
            .post(ANILIST_API)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("AniList API error: {} - {}", status, body));
        }

        let body: GraphQlResponse = response.json().await?;
        if let Some(errors) = body.errors {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(anyhow::anyhow!(
                "AniList GraphQL error: {}",
                messages.join("; ")
            ));
        }

        body.data
            .ok_or_else(|| anyhow::anyhow!("AniList response missing data"))
    }

    /// One page of the full anime catalog, ordered by id for a stable walk.
    pub async fn list_page(&self, page: u32) -> Result<MediaPage> {
        let query = format!(
            r"query ($page: Int, $perPage: Int) {{
                Page(page: $page, perPage: $perPage) {{
                    pageInfo {{ hasNextPage total }}
                    media(type: ANIME, sort: ID) {{ {MEDIA_FIELDS} }}
                }}
            }}"
        );
        let data = self
            .post(&query, serde_json::json!({ "page": page, "perPage": 50 }))
            .await?;

        let page = data
            .page
            .ok_or_else(|| anyhow::anyhow!("AniList response missing Page"))?;
        let info = page.page_info;
        Ok(MediaPage {
            media: page.media,
            has_next_page: info
                .as_ref()
                .and_then(|i| i.has_next_page)
                .unwrap_or(false),
            total: info.and_then(|i| i.total),
        })
    }

    pub async fn get_media(&self, id: i32) -> Result<Option<Media>> {
        let query = format!(
            r"query ($id: Int) {{
                Media(id: $id, type: ANIME) {{ {MEDIA_FIELDS} }}
            }}"
        );
        match self.post(&query, serde_json::json!({ "id": id })).await {
            Ok(data) => Ok(data.media),
            Err(e) if e.to_string().contains("Not Found") => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn search(&self, search: &str, page: u32) -> Result<MediaPage> {
        let query = format!(
            r"query ($search: String, $page: Int) {{
                Page(page: $page, perPage: 10) {{
                    pageInfo {{ hasNextPage total }}
                    media(search: $search, type: ANIME) {{ {MEDIA_FIELDS} }}
                }}
            }}"
        );
        let data = self
            .post(
                &query,
                serde_json::json!({ "search": search, "page": page }),
            )
            .await?;

        let page = data
            .page
            .ok_or_else(|| anyhow::anyhow!("AniList response missing Page"))?;
        let info = page.page_info;
        Ok(MediaPage {
            media: page.media,
            has_next_page: info
                .as_ref()
                .and_then(|i| i.has_next_page)
                .unwrap_or(false),
            total: info.and_then(|i| i.total),
        })
    }
}

/// AniList status vocabulary onto the unified enum. A hiatus still counts
/// as airing from a tracking perspective.
#[must_use]
pub fn map_status(raw: &str) -> Option<ContentStatus> {
    match raw {
        "RELEASING" | "HIATUS" => Some(ContentStatus::Airing),
        "FINISHED" => Some(ContentStatus::Completed),
        "NOT_YET_RELEASED" => Some(ContentStatus::Upcoming),
        "CANCELLED" => Some(ContentStatus::Cancelled),
        _ => None,
    }
}

#[must_use]
pub fn to_content_record(media: &Media) -> ContentRecord {
    let title = media
        .title
        .romaji
        .clone()
        .or_else(|| media.title.english.clone())
        .or_else(|| media.title.native.clone())
        .unwrap_or_else(|| format!("AniList #{}", media.id));

    let mut record = ContentRecord::new(
        Source::Anilist,
        media.id.to_string(),
        title,
        MediaType::Anime,
    );

    record.overview = media.description.as_deref().and_then(super::strip_html);
    record.genres = media.genres.clone().unwrap_or_default();
    record.tags = media
        .tags
        .as_ref()
        .map(|tags| tags.iter().map(|t| t.name.clone()).collect())
        .unwrap_or_default();
    record.poster_url = media.cover_image.as_ref().and_then(|c| {
        c.extra_large.clone().or_else(|| c.large.clone())
    });
    record.backdrop_url = media.banner_image.clone();
    record.popularity = media.popularity.map(f64::from);
    record.year = media
        .season_year
        .or_else(|| media.start_date.as_ref().and_then(|d| d.year));
    record.end_year = media.end_date.as_ref().and_then(|d| d.year);
    record.status = media.status.as_deref().and_then(map_status);
    record.total_episodes = media.episodes;
    record.season = media.season.as_ref().map(|s| s.to_lowercase());
    record.runtime = media.duration;
    record.source_material = media.source.as_ref().map(|s| s.replace('_', " "));
    record.studio = media.studios.as_ref().and_then(|s| {
        s.nodes
            .iter()
            .find(|n| n.is_animation_studio)
            .or_else(|| s.nodes.first())
            .map(|n| n.name.clone())
    });
    record.rating = media.average_score.map(|score| f64::from(score) / 10.0);

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_native_status() {
        assert_eq!(map_status("RELEASING"), Some(ContentStatus::Airing));
        assert_eq!(map_status("FINISHED"), Some(ContentStatus::Completed));
        assert_eq!(
            map_status("NOT_YET_RELEASED"),
            Some(ContentStatus::Upcoming)
        );
        assert_eq!(map_status("CANCELLED"), Some(ContentStatus::Cancelled));
        assert_eq!(map_status("HIATUS"), Some(ContentStatus::Airing));
        assert_eq!(map_status("SOMETHING"), None);
    }

    #[test]
    fn converts_media_to_record() {
        let json = serde_json::json!({
            "id": 154587,
            "title": { "romaji": "Sousou no Frieren", "english": "Frieren: Beyond Journey's End", "native": null },
            "format": "TV",
            "episodes": 28,
            "duration": 24,
            "status": "FINISHED",
            "season": "FALL",
            "seasonYear": 2023,
            "startDate": { "year": 2023 },
            "endDate": { "year": 2024 },
            "description": "The adventure is over but life goes on.<br><br>(Source: Crunchyroll)",
            "averageScore": 93,
            "popularity": 750000,
            "genres": ["Adventure", "Drama", "Fantasy"],
            "tags": [{ "name": "Female Protagonist" }],
            "coverImage": { "extraLarge": "https://img/xl.png", "large": "https://img/l.png" },
            "bannerImage": "https://img/banner.png",
            "source": "MANGA",
            "studios": { "nodes": [{ "name": "Madhouse", "isAnimationStudio": true }] }
        });
        let media: Media = serde_json::from_value(json).unwrap();
        let record = to_content_record(&media);

        assert_eq!(record.key(), (Source::Anilist, "154587"));
        assert_eq!(record.status, Some(ContentStatus::Completed));
        assert_eq!(record.year, Some(2023));
        assert_eq!(record.end_year, Some(2024));
        assert_eq!(record.rating, Some(9.3));
        assert_eq!(record.studio.as_deref(), Some("Madhouse"));
        assert_eq!(record.season.as_deref(), Some("fall"));
        assert!(
            record
                .overview
                .as_deref()
                .unwrap()
                .starts_with("The adventure is over")
        );
    }
}
