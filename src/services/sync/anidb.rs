use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::clients::anidb::{self, AnidbClient};
use crate::domain::Source;
use crate::services::catalog::{CatalogSource, FetchedItem};

/// AniDB exposes no paginated full index; the hot-anime list is the
/// browsable catalog surface, sliced into fixed-size pages so the shared
/// runner can checkpoint through it like any other source.
const HOT_PAGE_SIZE: usize = 25;

pub struct AnidbCatalog {
    client: Arc<AnidbClient>,
}

impl AnidbCatalog {
    #[must_use]
    pub fn new(client: Arc<AnidbClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CatalogSource for AnidbCatalog {
    fn source(&self) -> Source {
        Source::Anidb
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<FetchedItem>> {
        let hot = self.client.hot_anime().await?;
        let start = (page.saturating_sub(1) as usize) * HOT_PAGE_SIZE;
        if start >= hot.len() {
            return Ok(Vec::new());
        }
        let end = (start + HOT_PAGE_SIZE).min(hot.len());
        Ok(hot[start..end]
            .iter()
            .map(|anime| FetchedItem::new(anidb::to_content_record(anime)))
            .collect())
    }

    async fn fetch_detail(&self, source_id: &str) -> Result<Option<FetchedItem>> {
        let aid: i64 = source_id
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid AniDB id: {source_id}"))?;
        let anime = self.client.get_anime(aid).await?;
        Ok(anime.map(|anime| FetchedItem::new(anidb::to_content_record(&anime))))
    }
}
