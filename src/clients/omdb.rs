use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use crate::constants::rate;
use crate::services::rate_limit::RequestGate;

const OMDB_API: &str = "https://www.omdbapi.com/";

#[derive(Debug, Deserialize)]
struct OmdbResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "imdbVotes")]
    imdb_votes: Option<String>,
    #[serde(rename = "Ratings")]
    ratings: Option<Vec<OmdbRatingEntry>>,
}

#[derive(Debug, Deserialize)]
struct OmdbRatingEntry {
    #[serde(rename = "Source")]
    source: String,
    #[serde(rename = "Value")]
    value: String,
}

/// Cross-source ratings resolved for one IMDb id.
#[derive(Debug, Clone)]
pub struct OmdbRating {
    pub imdb_rating: Option<f64>,
    pub imdb_votes: Option<i32>,
    pub rotten_tomatoes: Option<String>,
}

pub struct OmdbClient {
    client: Client,
    api_key: String,
    gate: Arc<RequestGate>,
}

impl OmdbClient {
    #[must_use]
    pub fn new(client: Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            gate: Arc::new(RequestGate::new("omdb", rate::OMDB_LIMIT, rate::OMDB_WINDOW)),
        }
    }

    /// Look up ratings by IMDb id. `Ok(None)` means OMDb knows nothing
    /// about the title; "N/A" fields are treated as absent.
    pub async fn get_by_imdb_id(&self, imdb_id: &str) -> Result<Option<OmdbRating>> {
        self.gate.acquire().await;

        let response = self
            .client
            .get(OMDB_API)
            .query(&[("i", imdb_id), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(super::redact(&e.to_string(), &self.api_key)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow::anyhow!("OMDb API error: {status}"));
        }

        let body: OmdbResponse = response.json().await?;
        if !body.response.eq_ignore_ascii_case("true") {
            return Ok(None);
        }

        let rotten_tomatoes = body.ratings.and_then(|entries| {
            entries
                .into_iter()
                .find(|r| r.source == "Rotten Tomatoes")
                .map(|r| r.value)
        });

        Ok(Some(OmdbRating {
            imdb_rating: parse_rating(body.imdb_rating.as_deref()),
            imdb_votes: parse_votes(body.imdb_votes.as_deref()),
            rotten_tomatoes,
        }))
    }
}

fn parse_rating(raw: Option<&str>) -> Option<f64> {
    raw.filter(|v| *v != "N/A").and_then(|v| v.parse().ok())
}

fn parse_votes(raw: Option<&str>) -> Option<i32> {
    raw.filter(|v| *v != "N/A")
        .and_then(|v| v.replace(',', "").parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ratings_and_comma_grouped_votes() {
        assert_eq!(parse_rating(Some("8.6")), Some(8.6));
        assert_eq!(parse_votes(Some("1,234,567")), Some(1_234_567));
    }

    #[test]
    fn not_available_fields_are_absent() {
        assert_eq!(parse_rating(Some("N/A")), None);
        assert_eq!(parse_votes(Some("N/A")), None);
        assert_eq!(parse_rating(None), None);
    }
}
