//! Cross-source rating backfill.
//!
//! Many records land without an IMDb rating: the quota was exhausted at
//! import time, the source never carried an id, or the record was added
//! manually. This job scans for them on a fixed interval and fills ratings
//! in under the shared daily quota, highest-popularity first so the
//! constrained budget goes to the content people actually browse.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::clients::tmdb::TmdbClient;
use crate::clients::tvmaze::TvmazeClient;
use crate::db::Store;
use crate::domain::{MediaType, Source};
use crate::models::content::ContentRecord;
use crate::models::cursor::BackfillState;
use crate::models::sync::BackfillOutcome;
use crate::services::enrichment::{EnrichOutcome, EnrichmentService};
use crate::services::quota::{QuotaProvider, QuotaStats};

/// Pseudo-source key for the backfill's import status row.
pub const RATING_BACKFILL_SOURCE: &str = "rating_backfill_state";

#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub batch_size: usize,
    pub interval_minutes: u64,
    pub lock_minutes: i64,
    pub startup_delay_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct TypeCounts {
    pub rated: u64,
    pub unrated: u64,
}

#[derive(Debug, Serialize)]
pub struct BackfillStatus {
    pub enabled: bool,
    pub movie: TypeCounts,
    pub tv: TypeCounts,
    pub anime: TypeCounts,
    pub quota: QuotaStats,
    pub state: BackfillState,
}

pub struct RatingBackfillService {
    store: Store,
    quota: Arc<QuotaProvider>,
    enrichment: Arc<EnrichmentService>,
    tmdb: Option<Arc<TmdbClient>>,
    tvmaze: Arc<TvmazeClient>,
    config: BackfillConfig,
}

impl RatingBackfillService {
    #[must_use]
    pub fn new(
        store: Store,
        quota: Arc<QuotaProvider>,
        enrichment: Arc<EnrichmentService>,
        tmdb: Option<Arc<TmdbClient>>,
        tvmaze: Arc<TvmazeClient>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            store,
            quota,
            enrichment,
            tmdb,
            tvmaze,
            config,
        }
    }

    /// Spawn the interval loop: one delayed run shortly after start, then
    /// one per configured interval.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let startup_delay = Duration::from_secs(self.config.startup_delay_secs);
        let period = Duration::from_secs(self.config.interval_minutes * 60);
        tokio::spawn(async move {
            tokio::time::sleep(startup_delay).await;
            let mut tick = interval(period);
            loop {
                tick.tick().await;
                match self.process_batch().await {
                    Ok(outcome) => {
                        if outcome.updated > 0 || outcome.failed > 0 {
                            info!(
                                updated = outcome.updated,
                                skipped = outcome.skipped,
                                failed = outcome.failed,
                                exhausted = outcome.exhausted,
                                "Rating backfill batch complete"
                            );
                        }
                    }
                    Err(e) => warn!("Rating backfill tick failed: {e}"),
                }
            }
        })
    }

    /// One batch. Guarded by a time-boxed persisted lock so overlapping
    /// ticks (or a hung previous run) never double-process.
    pub async fn process_batch(&self) -> Result<BackfillOutcome> {
        let mut outcome = BackfillOutcome::default();

        if !self.try_acquire_lock().await? {
            debug!("Rating backfill lock held, skipping tick");
            return Ok(outcome);
        }

        if self.quota.is_exhausted().await? {
            outcome.exhausted = true;
            self.release_lock(None).await?;
            return Ok(outcome);
        }

        let actionable = self
            .store
            .count_unrated(&[MediaType::Movie, MediaType::Tv])
            .await?;
        if actionable == 0 {
            self.release_lock(None).await?;
            return Ok(outcome);
        }

        let remaining = self.quota.remaining().await? as usize;
        let limit = self.config.batch_size.min(remaining).max(1) as u64;
        let batch = self
            .store
            .query_unrated(&[MediaType::Movie, MediaType::Tv], limit)
            .await?;

        info!(
            candidates = actionable,
            batch = batch.len(),
            quota_remaining = remaining,
            "Rating backfill batch starting"
        );

        let mut last_error = None;
        for record in batch {
            // Quota can run out mid-batch; stop at the item boundary, not
            // the batch boundary.
            if self.quota.is_exhausted().await? {
                outcome.exhausted = true;
                break;
            }

            match self.backfill_one(&record).await {
                Ok(EnrichOutcome::Applied) => outcome.updated += 1,
                Ok(_) => outcome.skipped += 1,
                Err(e) => {
                    outcome.failed += 1;
                    let message = format!(
                        "Backfill failed for {}/{}: {e}",
                        record.source, record.source_id
                    );
                    warn!("{message}");
                    last_error = Some(message);
                }
            }
        }

        self.release_lock(last_error).await?;
        Ok(outcome)
    }

    async fn backfill_one(&self, record: &ContentRecord) -> Result<EnrichOutcome> {
        let Some(id) = record.id else {
            return Ok(EnrichOutcome::Skipped);
        };

        let imdb_id = match &record.imdb_id {
            Some(existing) => Some(existing.clone()),
            None => self.resolve_imdb_id(record).await?,
        };

        match imdb_id {
            Some(imdb_id) => self.enrichment.enrich(id, &imdb_id).await,
            None => {
                // No resolvable id; stamp it checked so the next tick moves
                // on to other records.
                self.enrichment.mark_checked(id).await?;
                Ok(EnrichOutcome::NoData)
            }
        }
    }

    /// Source-specific external-id resolution: TMDB movies through the
    /// external-ids endpoint, TVmaze shows through a detail lookup.
    async fn resolve_imdb_id(&self, record: &ContentRecord) -> Result<Option<String>> {
        match record.source {
            Source::Tmdb => {
                let Some(tmdb) = &self.tmdb else {
                    return Ok(None);
                };
                let id: i64 = record
                    .source_id
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid TMDB id: {}", record.source_id))?;
                Ok(tmdb
                    .external_ids(id)
                    .await?
                    .and_then(|ids| ids.imdb_id)
                    .filter(|id| !id.is_empty()))
            }
            Source::Tvmaze => {
                let id: i64 = record
                    .source_id
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid TVmaze id: {}", record.source_id))?;
                Ok(self
                    .tvmaze
                    .get_show(id)
                    .await?
                    .and_then(|show| show.imdb_id()))
            }
            _ => Ok(None),
        }
    }

    async fn load_state(&self) -> Result<BackfillState> {
        Ok(self
            .store
            .ensure_import_status(RATING_BACKFILL_SOURCE)
            .await?
            .cursor
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default())
    }

    async fn save_state(&self, state: &BackfillState) -> Result<()> {
        self.store
            .set_cursor(RATING_BACKFILL_SOURCE, Some(serde_json::to_string(state)?))
            .await
    }

    async fn try_acquire_lock(&self) -> Result<bool> {
        let mut state = self.load_state().await?;
        let now = Utc::now();
        if state.is_locked(now) {
            return Ok(false);
        }
        state.lock_until =
            Some((now + ChronoDuration::minutes(self.config.lock_minutes)).to_rfc3339());
        self.save_state(&state).await?;
        Ok(true)
    }

    async fn release_lock(&self, last_error: Option<String>) -> Result<()> {
        let mut state = self.load_state().await?;
        state.lock_until = None;
        state.last_run_at = Some(Utc::now().to_rfc3339());
        if last_error.is_some() {
            state.last_error = last_error;
        }
        self.save_state(&state).await
    }

    async fn type_counts(&self, media_type: MediaType) -> Result<TypeCounts> {
        Ok(TypeCounts {
            rated: self.store.count_rated(media_type).await?,
            unrated: self.store.count_missing_rating(media_type).await?,
        })
    }

    /// The read model the operational dashboard polls.
    pub async fn status(&self) -> Result<BackfillStatus> {
        Ok(BackfillStatus {
            enabled: self.enrichment.is_enabled(),
            movie: self.type_counts(MediaType::Movie).await?,
            tv: self.type_counts(MediaType::Tv).await?,
            anime: self.type_counts(MediaType::Anime).await?,
            quota: self.quota.stats().await?,
            state: self.load_state().await?,
        })
    }
}
