use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use std::sync::Arc;
use tracing::info;

use crate::clients::jikan::{self, JikanClient};
use crate::constants::sync::MAX_EPISODE_PAGES;
use crate::db::ProgressPhase;
use crate::domain::Source;
use crate::models::cursor::{CuratedCursor, SEASONS, previous_season};
use crate::models::sync::SyncOutcome;
use crate::services::catalog::{
    CatalogSource, CuratedImport, FetchedItem, ImportRunner, PhaseEnd,
};

/// Jikan's full anime index ordered by MAL id.
pub struct JikanCatalog {
    client: Arc<JikanClient>,
}

impl JikanCatalog {
    #[must_use]
    pub fn new(client: Arc<JikanClient>) -> Self {
        Self { client }
    }

    /// Detail refresh pulls the episode list too, up to a bounded number
    /// of 100-episode pages.
    async fn fetch_with_episodes(&self, mal_id: i32) -> Result<Option<FetchedItem>> {
        let Some(anime) = self.client.get_anime(mal_id).await? else {
            return Ok(None);
        };
        let mut record = jikan::to_content_record(&anime);

        let mut episodes = Vec::new();
        for page in 1..=MAX_EPISODE_PAGES {
            let batch = self.client.get_episodes(mal_id, page).await?;
            let more = batch.has_next_page;
            episodes.extend(batch.items);
            if !more {
                break;
            }
        }
        if !episodes.is_empty() {
            jikan::attach_episodes(&mut record, &episodes);
        }

        Ok(Some(FetchedItem::new(record)))
    }
}

#[async_trait]
impl CatalogSource for JikanCatalog {
    fn source(&self) -> Source {
        Source::Jikan
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<FetchedItem>> {
        let page = self.client.list_page(page).await?;
        Ok(page
            .items
            .iter()
            .map(|anime| FetchedItem::new(jikan::to_content_record(anime)))
            .collect())
    }

    async fn fetch_detail(&self, source_id: &str) -> Result<Option<FetchedItem>> {
        let mal_id: i32 = source_id
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid MAL id: {source_id}"))?;
        self.fetch_with_episodes(mal_id).await
    }

    async fn total_available(&self) -> Result<Option<i32>> {
        Ok(self.client.list_page(1).await?.total_items)
    }
}

/// Phase 3 for Jikan: a top-anime sweep for ranking freshness on every
/// run, then a seasonal backfill that walks backward from the current
/// season across runs, resumable through its own tagged cursor.
pub struct JikanCurated {
    client: Arc<JikanClient>,
    top_max_pages: u32,
    seasonal_min_year: i32,
    seasons_per_run: u32,
}

impl JikanCurated {
    #[must_use]
    pub fn new(
        client: Arc<JikanClient>,
        top_max_pages: u32,
        seasonal_min_year: i32,
        seasons_per_run: u32,
    ) -> Self {
        Self {
            client,
            top_max_pages,
            seasonal_min_year,
            seasons_per_run,
        }
    }

    async fn load_cursor(&self, runner: &ImportRunner) -> Result<CuratedCursor> {
        let raw = runner
            .store()
            .ensure_import_status(runner.source().as_str())
            .await?
            .cursor;
        Ok(raw
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(CuratedCursor::start))
    }

    async fn save_cursor(&self, runner: &ImportRunner, cursor: &CuratedCursor) -> Result<()> {
        runner
            .store()
            .set_cursor(
                runner.source().as_str(),
                Some(serde_json::to_string(cursor)?),
            )
            .await
    }

    async fn top_sweep(
        &self,
        runner: &ImportRunner,
        outcome: &mut SyncOutcome,
        start_page: u32,
    ) -> Result<PhaseEnd> {
        let key = runner.source().as_str();
        let mut page = start_page.max(1);

        while page <= self.top_max_pages {
            if runner.is_paused().await? {
                self.save_cursor(runner, &CuratedCursor::Top { page }).await?;
                return Ok(PhaseEnd::Paused);
            }

            let batch = self.client.top_page(page).await?;
            if batch.items.is_empty() {
                break;
            }
            for anime in &batch.items {
                let item = FetchedItem::new(jikan::to_content_record(anime));
                runner.upsert_item(&item, outcome).await?;
            }
            runner
                .store()
                .set_progress(
                    key,
                    ProgressPhase::Curated,
                    &format!("top anime page {page}/{}", self.top_max_pages),
                )
                .await?;

            if !batch.has_next_page {
                break;
            }
            page += 1;
        }

        Ok(PhaseEnd::Completed)
    }

    async fn import_season(
        &self,
        runner: &ImportRunner,
        outcome: &mut SyncOutcome,
        year: i32,
        season: &str,
    ) -> Result<PhaseEnd> {
        let key = runner.source().as_str();
        let mut page = 1;

        loop {
            if runner.is_paused().await? {
                return Ok(PhaseEnd::Paused);
            }

            let batch = self.client.season_page(year, season, page).await?;
            for anime in &batch.items {
                let item = FetchedItem::new(jikan::to_content_record(anime));
                runner.upsert_item(&item, outcome).await?;
            }
            runner
                .store()
                .set_progress(
                    key,
                    ProgressPhase::Curated,
                    &format!("seasonal backfill {season} {year}, page {page}"),
                )
                .await?;

            if !batch.has_next_page {
                return Ok(PhaseEnd::Completed);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl CuratedImport for JikanCurated {
    async fn run(&self, runner: &ImportRunner, outcome: &mut SyncOutcome) -> Result<PhaseEnd> {
        let key = runner.source().as_str();
        let cursor = self.load_cursor(runner).await?;

        // A mid-seasonal cursor means an earlier run already swept the top
        // list; resume the walk instead of repeating it.
        let mut seasonal = match cursor {
            CuratedCursor::Seasonal { year, season } => Some((year, season)),
            CuratedCursor::Top { page } => {
                if self.top_sweep(runner, outcome, page).await? == PhaseEnd::Paused {
                    return Ok(PhaseEnd::Paused);
                }
                let now = Utc::now();
                let season = SEASONS[(now.month0() / 3) as usize].to_string();
                Some((now.year(), season))
            }
            CuratedCursor::Done => {
                if self.top_sweep(runner, outcome, 1).await? == PhaseEnd::Paused {
                    return Ok(PhaseEnd::Paused);
                }
                None
            }
        };

        let mut budget = self.seasons_per_run;
        while let Some((year, season)) = seasonal.clone() {
            if year < self.seasonal_min_year {
                info!(source = key, "Seasonal backfill reached {year}, done");
                self.save_cursor(runner, &CuratedCursor::Done).await?;
                seasonal = None;
                break;
            }
            if budget == 0 {
                break;
            }

            self.save_cursor(
                runner,
                &CuratedCursor::Seasonal {
                    year,
                    season: season.clone(),
                },
            )
            .await?;

            if self.import_season(runner, outcome, year, &season).await? == PhaseEnd::Paused {
                return Ok(PhaseEnd::Paused);
            }

            let (prev_year, prev_season) = previous_season(year, &season);
            seasonal = Some((prev_year, prev_season));
            budget -= 1;
        }

        if let Some((year, season)) = seasonal {
            // Out of budget for this run; the cursor resumes the walk on
            // the next one.
            self.save_cursor(runner, &CuratedCursor::Seasonal { year, season })
                .await?;
            runner
                .store()
                .set_progress(key, ProgressPhase::Curated, "(Phase 3 paused until next run)")
                .await?;
        } else {
            runner
                .store()
                .set_progress(key, ProgressPhase::Curated, "(Phase 3 Complete)")
                .await?;
        }

        Ok(PhaseEnd::Completed)
    }
}
