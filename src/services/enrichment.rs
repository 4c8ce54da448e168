//! The single quota-gated path to OMDb.
//!
//! Conversion never fetches ratings itself; both the import runners (for
//! import-time freshness) and the backfill manager call through here, so
//! the quota check, the "checked, no data" stamp and the rating patch
//! behave identically no matter who asked.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::clients::omdb::OmdbClient;
use crate::db::Store;
use crate::models::content::RatingPatch;
use crate::services::quota::QuotaProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// A rating was fetched and persisted.
    Applied,
    /// OMDb answered but had no rating; the id and a checked-at stamp were
    /// persisted so the record is not retried every tick.
    NoData,
    /// Quota exhausted or no OMDb client configured; nothing persisted.
    Skipped,
}

pub struct EnrichmentService {
    store: Store,
    omdb: Option<Arc<OmdbClient>>,
    quota: Arc<QuotaProvider>,
}

impl EnrichmentService {
    #[must_use]
    pub fn new(store: Store, omdb: Option<Arc<OmdbClient>>, quota: Arc<QuotaProvider>) -> Self {
        Self { store, omdb, quota }
    }

    #[must_use]
    pub fn quota(&self) -> &Arc<QuotaProvider> {
        &self.quota
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.omdb.is_some()
    }

    /// Fetch ratings for one record by IMDb id and persist the result.
    pub async fn enrich(&self, content_id: i32, imdb_id: &str) -> Result<EnrichOutcome> {
        let Some(omdb) = &self.omdb else {
            return Ok(EnrichOutcome::Skipped);
        };
        if self.quota.is_exhausted().await? {
            debug!(content_id, "OMDb quota exhausted, skipping enrichment");
            return Ok(EnrichOutcome::Skipped);
        }

        let rating = omdb.get_by_imdb_id(imdb_id).await?;
        self.quota.increment().await?;

        let now = Utc::now().to_rfc3339();
        match rating {
            Some(r) if r.imdb_rating.is_some() => {
                self.store
                    .apply_rating_patch(
                        content_id,
                        &RatingPatch {
                            imdb_id: Some(imdb_id.to_string()),
                            imdb_rating: r.imdb_rating,
                            vote_count: r.imdb_votes,
                            rotten_tomatoes_rating: r.rotten_tomatoes,
                            imdb_checked_at: Some(now),
                        },
                    )
                    .await?;
                Ok(EnrichOutcome::Applied)
            }
            _ => {
                // Persisting the id + stamp distinguishes "checked, no
                // data" from "never checked".
                self.store
                    .apply_rating_patch(
                        content_id,
                        &RatingPatch {
                            imdb_id: Some(imdb_id.to_string()),
                            imdb_checked_at: Some(now),
                            ..Default::default()
                        },
                    )
                    .await?;
                Ok(EnrichOutcome::NoData)
            }
        }
    }

    /// Record that a record has no resolvable external id, so the backfill
    /// does not re-attempt it on every tick.
    pub async fn mark_checked(&self, content_id: i32) -> Result<()> {
        self.store
            .apply_rating_patch(
                content_id,
                &RatingPatch {
                    imdb_checked_at: Some(Utc::now().to_rfc3339()),
                    ..Default::default()
                },
            )
            .await
    }
}
