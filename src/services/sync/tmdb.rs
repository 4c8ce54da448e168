use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::clients::tmdb::{self, TmdbClient};
use crate::domain::Source;
use crate::services::catalog::{CatalogSource, FetchedItem};

/// TMDB's popular-movies list. List results carry no IMDb id, so phase 2
/// items go in unenriched and the rating backfill resolves ids later via
/// the external-ids endpoint; detail refreshes carry the id inline.
pub struct TmdbCatalog {
    client: Arc<TmdbClient>,
}

impl TmdbCatalog {
    #[must_use]
    pub fn new(client: Arc<TmdbClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CatalogSource for TmdbCatalog {
    fn source(&self) -> Source {
        Source::Tmdb
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<FetchedItem>> {
        let page = self.client.popular_page(page).await?;
        Ok(page
            .results
            .iter()
            .map(|movie| FetchedItem::new(tmdb::to_content_record(movie)))
            .collect())
    }

    async fn fetch_detail(&self, source_id: &str) -> Result<Option<FetchedItem>> {
        let id: i64 = source_id
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid TMDB id: {source_id}"))?;
        let movie = self.client.get_movie(id).await?;
        Ok(movie.map(|movie| {
            FetchedItem::with_imdb_id(tmdb::to_content_record(&movie), movie.imdb_id.clone())
        }))
    }

    async fn total_available(&self) -> Result<Option<i32>> {
        let first = self.client.popular_page(1).await?;
        Ok(Some(first.total_results))
    }
}
