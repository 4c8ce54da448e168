//! AniDB HTTP API client.
//!
//! AniDB speaks XML and identifies callers by a registered client string
//! carried in every request URL; that credential is redacted from any error
//! text before it can reach logs or status rows.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use crate::constants::rate;
use crate::domain::{ContentStatus, MediaType, Source};
use crate::models::content::{ContentRecord, EpisodeInfo};
use crate::services::rate_limit::RequestGate;

const ANIDB_API: &str = "http://api.anidb.net:9001/httpapi";
const ANIDB_IMAGE_BASE: &str = "https://cdn-eu.anidb.net/images/main";
const PROTOVER: &str = "1";

#[derive(Debug, Deserialize)]
pub struct AnidbAnime {
    #[serde(rename = "@id")]
    pub id: i64,
    #[serde(rename = "type")]
    pub anime_type: Option<String>,
    pub episodecount: Option<i32>,
    pub startdate: Option<String>,
    pub enddate: Option<String>,
    pub titles: Option<AnidbTitles>,
    pub description: Option<String>,
    pub ratings: Option<AnidbRatings>,
    pub picture: Option<String>,
    pub tags: Option<AnidbTags>,
    pub episodes: Option<AnidbEpisodes>,
}

#[derive(Debug, Deserialize)]
pub struct AnidbTitles {
    #[serde(rename = "title", default)]
    pub entries: Vec<AnidbTitle>,
}

#[derive(Debug, Deserialize)]
pub struct AnidbTitle {
    #[serde(rename = "@type")]
    pub title_type: Option<String>,
    #[serde(rename = "@xml:lang")]
    pub lang: Option<String>,
    #[serde(rename = "$text")]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct AnidbRatings {
    pub permanent: Option<AnidbRating>,
    pub temporary: Option<AnidbRating>,
}

#[derive(Debug, Deserialize)]
pub struct AnidbRating {
    #[serde(rename = "@count")]
    pub count: Option<i32>,
    #[serde(rename = "$text")]
    pub value: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct AnidbTags {
    #[serde(rename = "tag", default)]
    pub entries: Vec<AnidbTag>,
}

#[derive(Debug, Deserialize)]
pub struct AnidbTag {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnidbEpisodes {
    #[serde(rename = "episode", default)]
    pub entries: Vec<AnidbEpisode>,
}

#[derive(Debug, Deserialize)]
pub struct AnidbEpisode {
    #[serde(rename = "@id")]
    pub id: i64,
    pub epno: Option<AnidbEpno>,
    pub airdate: Option<String>,
    pub rating: Option<AnidbRating>,
    #[serde(rename = "title", default)]
    pub titles: Vec<AnidbTitle>,
}

#[derive(Debug, Deserialize)]
pub struct AnidbEpno {
    /// 1 = regular episode, everything else is specials/openings/trailers.
    #[serde(rename = "@type")]
    pub epno_type: Option<String>,
    #[serde(rename = "$text")]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HotAnimeList {
    #[serde(rename = "anime", default)]
    anime: Vec<AnidbAnime>,
}

impl AnidbAnime {
    /// Main title, preferring the official English one.
    #[must_use]
    pub fn preferred_title(&self) -> Option<String> {
        let entries = &self.titles.as_ref()?.entries;
        entries
            .iter()
            .find(|t| {
                t.lang.as_deref() == Some("en") && t.title_type.as_deref() == Some("official")
            })
            .or_else(|| entries.iter().find(|t| t.title_type.as_deref() == Some("main")))
            .or_else(|| entries.first())
            .map(|t| t.value.clone())
    }
}

pub struct AnidbClient {
    client: Client,
    client_name: String,
    client_version: String,
    gate: Arc<RequestGate>,
}

impl AnidbClient {
    #[must_use]
    pub fn new(client: Client, client_name: String, client_version: String) -> Self {
        Self {
            client,
            client_name,
            client_version,
            gate: Arc::new(RequestGate::new(
                "anidb",
                rate::ANIDB_LIMIT,
                rate::ANIDB_WINDOW,
            )),
        }
    }

    fn redact(&self, text: &str) -> String {
        super::redact(text, &self.client_name)
    }

    async fn request(&self, params: &[(&str, &str)]) -> Result<String> {
        self.gate.acquire().await;

        let mut query: Vec<(&str, &str)> = vec![
            ("client", self.client_name.as_str()),
            ("clientver", self.client_version.as_str()),
            ("protover", PROTOVER),
        ];
        query.extend_from_slice(params);

        let response = self
            .client
            .get(ANIDB_API)
            .query(&query)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(self.redact(&e.to_string())))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow::anyhow!("AniDB API error: {status}"));
        }

        let body = response
            .text()
            .await
            .map_err(|e| anyhow::anyhow!(self.redact(&e.to_string())))?;

        if body.trim_start().starts_with("<error") {
            return Err(anyhow::anyhow!(
                "AniDB API error: {}",
                self.redact(body.trim())
            ));
        }

        Ok(body)
    }

    pub async fn get_anime(&self, aid: i64) -> Result<Option<AnidbAnime>> {
        let aid_param = aid.to_string();
        let body = match self
            .request(&[("request", "anime"), ("aid", aid_param.as_str())])
            .await
        {
            Ok(body) => body,
            // AniDB reports unknown ids through its error payload.
            Err(e) if e.to_string().contains("ANIME_NOT_FOUND") => return Ok(None),
            Err(e) => return Err(e),
        };

        let anime: AnidbAnime = quick_xml::de::from_str(&body)
            .map_err(|e| anyhow::anyhow!("AniDB XML parse error: {e}"))?;
        Ok(Some(anime))
    }

    /// The currently-hot list; AniDB has no paginated full index, so this
    /// is the browsable catalog surface.
    pub async fn hot_anime(&self) -> Result<Vec<AnidbAnime>> {
        let body = self.request(&[("request", "hotanime")]).await?;
        let list: HotAnimeList = quick_xml::de::from_str(&body)
            .map_err(|e| anyhow::anyhow!("AniDB XML parse error: {e}"))?;
        Ok(list.anime)
    }
}

/// AniDB carries no status vocabulary; derive one from the air dates.
#[must_use]
pub fn derive_status(startdate: Option<&str>, enddate: Option<&str>) -> Option<ContentStatus> {
    let today = Utc::now().date_naive();
    let parse = |raw: &str| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok();

    if let Some(end) = enddate.and_then(parse) {
        if end <= today {
            return Some(ContentStatus::Completed);
        }
    }
    match startdate.and_then(parse) {
        Some(start) if start <= today => Some(ContentStatus::Airing),
        Some(_) => Some(ContentStatus::Upcoming),
        None => None,
    }
}

#[must_use]
pub fn to_content_record(anime: &AnidbAnime) -> ContentRecord {
    let title = anime
        .preferred_title()
        .unwrap_or_else(|| format!("AniDB #{}", anime.id));
    let mut record = ContentRecord::new(
        Source::Anidb,
        anime.id.to_string(),
        title,
        MediaType::Anime,
    );

    record.overview = anime.description.as_deref().and_then(super::strip_html);
    record.tags = anime
        .tags
        .as_ref()
        .map(|tags| tags.entries.iter().filter_map(|t| t.name.clone()).collect())
        .unwrap_or_default();
    record.poster_url = anime
        .picture
        .as_ref()
        .map(|p| format!("{ANIDB_IMAGE_BASE}/{p}"));
    record.year = anime
        .startdate
        .as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse().ok());
    record.end_year = anime
        .enddate
        .as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse().ok());
    record.release_date = anime.startdate.clone();
    record.status = derive_status(anime.startdate.as_deref(), anime.enddate.as_deref());
    record.total_episodes = anime.episodecount;

    if let Some(ratings) = &anime.ratings {
        let permanent = ratings.permanent.as_ref().or(ratings.temporary.as_ref());
        record.rating = permanent.and_then(|r| r.value);
    }

    if let Some(episodes) = &anime.episodes {
        record.episode_data = episodes
            .entries
            .iter()
            .filter(|e| {
                e.epno
                    .as_ref()
                    .and_then(|n| n.epno_type.as_deref())
                    .unwrap_or("1")
                    == "1"
            })
            .filter_map(|e| {
                let number = e
                    .epno
                    .as_ref()
                    .and_then(|n| n.value.as_deref())
                    .and_then(|v| v.parse().ok())?;
                Some(EpisodeInfo {
                    id: Some(e.id),
                    title: e
                        .titles
                        .iter()
                        .find(|t| t.lang.as_deref() == Some("en"))
                        .or_else(|| e.titles.first())
                        .map(|t| t.value.clone()),
                    season: None,
                    number,
                    airdate: e.airdate.clone(),
                    summary: None,
                    score: e.rating.as_ref().and_then(|r| r.value),
                    filler: None,
                    recap: None,
                })
            })
            .collect();
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_derived_from_air_dates() {
        assert_eq!(
            derive_status(Some("1999-01-03"), Some("1999-03-28")),
            Some(ContentStatus::Completed)
        );
        assert_eq!(
            derive_status(Some("1999-01-03"), None),
            Some(ContentStatus::Airing)
        );
        assert_eq!(
            derive_status(Some("2999-01-01"), None),
            Some(ContentStatus::Upcoming)
        );
        assert_eq!(derive_status(None, None), None);
    }

    #[test]
    fn parses_anime_xml_and_converts() {
        let xml = r#"
            <anime id="1" restricted="false">
              <type>TV Series</type>
              <episodecount>13</episodecount>
              <startdate>1999-01-03</startdate>
              <enddate>1999-03-28</enddate>
              <titles>
                <title xml:lang="x-jat" type="main">Seikai no Monshou</title>
                <title xml:lang="en" type="official">Crest of the Stars</title>
              </titles>
              <description>Banner of the Stars precursor &amp; space opera.</description>
              <ratings><permanent count="4523">8.16</permanent></ratings>
              <picture>12.jpg</picture>
              <tags><tag id="30"><name>space travel</name></tag></tags>
              <episodes>
                <episode id="100"><epno type="1">1</epno><airdate>1999-01-03</airdate>
                  <title xml:lang="en">Invasion</title></episode>
                <episode id="101"><epno type="2">S1</epno></episode>
              </episodes>
            </anime>"#;

        let anime: AnidbAnime = quick_xml::de::from_str(xml).unwrap();
        let record = to_content_record(&anime);

        assert_eq!(record.key(), (Source::Anidb, "1"));
        assert_eq!(record.title, "Crest of the Stars");
        assert_eq!(record.status, Some(ContentStatus::Completed));
        assert_eq!(record.year, Some(1999));
        assert_eq!(record.rating, Some(8.16));
        assert_eq!(record.tags, vec!["space travel".to_string()]);
        // The special (epno type 2) is filtered out.
        assert_eq!(record.episode_data.len(), 1);
        assert_eq!(record.episode_data[0].number, 1);
        assert_eq!(record.episode_data[0].title.as_deref(), Some("Invasion"));
    }
}
