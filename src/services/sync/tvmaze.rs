use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::clients::tvmaze::{self, TvmazeClient};
use crate::domain::Source;
use crate::services::catalog::{CatalogSource, FetchedItem};

/// TVmaze's full show index. Pages here are 1-based; the API itself is
/// 0-based, and a 404 past the end surfaces as the empty page that
/// terminates phase 2.
pub struct TvmazeCatalog {
    client: Arc<TvmazeClient>,
}

impl TvmazeCatalog {
    #[must_use]
    pub fn new(client: Arc<TvmazeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CatalogSource for TvmazeCatalog {
    fn source(&self) -> Source {
        Source::Tvmaze
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<FetchedItem>> {
        let shows = self.client.fetch_index_page(page.saturating_sub(1)).await?;
        Ok(shows
            .iter()
            .map(|show| {
                FetchedItem::with_imdb_id(tvmaze::to_content_record(show), show.imdb_id())
            })
            .collect())
    }

    async fn fetch_detail(&self, source_id: &str) -> Result<Option<FetchedItem>> {
        let id: i64 = source_id
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid TVmaze id: {source_id}"))?;
        let show = self.client.get_show(id).await?;
        Ok(show.map(|show| {
            FetchedItem::with_imdb_id(tvmaze::to_content_record(&show), show.imdb_id())
        }))
    }
}
