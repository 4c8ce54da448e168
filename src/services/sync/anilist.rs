use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::clients::anilist::{self, AnilistClient};
use crate::domain::Source;
use crate::services::catalog::{CatalogSource, FetchedItem};

/// AniList's full anime catalog via the GraphQL paginator, ordered by id.
pub struct AnilistCatalog {
    client: Arc<AnilistClient>,
}

impl AnilistCatalog {
    #[must_use]
    pub fn new(client: Arc<AnilistClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CatalogSource for AnilistCatalog {
    fn source(&self) -> Source {
        Source::Anilist
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<FetchedItem>> {
        let page = self.client.list_page(page).await?;
        Ok(page
            .media
            .iter()
            .map(|media| FetchedItem::new(anilist::to_content_record(media)))
            .collect())
    }

    async fn fetch_detail(&self, source_id: &str) -> Result<Option<FetchedItem>> {
        let id: i32 = source_id
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid AniList id: {source_id}"))?;
        let media = self.client.get_media(id).await?;
        Ok(media.map(|media| FetchedItem::new(anilist::to_content_record(&media))))
    }

    async fn total_available(&self) -> Result<Option<i32>> {
        Ok(self.client.list_page(1).await?.total)
    }
}
