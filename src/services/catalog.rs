//! The multi-phase import engine.
//!
//! [`CatalogSource`] is the capability set every provider adapter exposes:
//! paginated catalog fetch, detail fetch, and (inside the returned
//! [`FetchedItem`]) the already-converted unified record. [`ImportRunner`]
//! drives one source through its phases, persisting progress after every
//! unit of work so a crash or pause resumes from the last committed
//! checkpoint.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::constants::sync::{
    HEALTH_DISPARITY_ABSOLUTE, HEALTH_DISPARITY_RATIO, MAX_CONSECUTIVE_PAGE_FAILURES,
    PROGRESS_STRIDE,
};
use crate::db::{ProgressPhase, Store};
use crate::domain::{ContentStatus, Source};
use crate::models::content::ContentRecord;
use crate::models::sync::SyncOutcome;
use crate::services::enrichment::EnrichmentService;

/// One converted catalog item plus the cross-reference id the enrichment
/// step needs, extracted during conversion.
#[derive(Debug)]
pub struct FetchedItem {
    pub record: ContentRecord,
    pub imdb_id: Option<String>,
}

impl FetchedItem {
    #[must_use]
    pub fn new(record: ContentRecord) -> Self {
        Self {
            record,
            imdb_id: None,
        }
    }

    #[must_use]
    pub fn with_imdb_id(record: ContentRecord, imdb_id: Option<String>) -> Self {
        Self { record, imdb_id }
    }
}

/// Provider adapter capability set. Pages are 1-based; an empty page means
/// the catalog is exhausted.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn source(&self) -> Source;

    async fn fetch_page(&self, page: u32) -> Result<Vec<FetchedItem>>;

    async fn fetch_detail(&self, source_id: &str) -> Result<Option<FetchedItem>>;

    /// Total catalog size if the provider reports one.
    async fn total_available(&self) -> Result<Option<i32>> {
        Ok(None)
    }
}

/// Optional source-specific curated sweep run as phase 3.
#[async_trait]
pub trait CuratedImport: Send + Sync {
    async fn run(&self, runner: &ImportRunner, outcome: &mut SyncOutcome) -> Result<PhaseEnd>;
}

/// How a phase finished: ran to completion, or stopped early because the
/// live pause flag flipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEnd {
    Completed,
    Paused,
}

pub struct ImportRunner {
    source: Source,
    store: Store,
    catalog: Arc<dyn CatalogSource>,
    enrichment: Arc<EnrichmentService>,
    curated: Option<Arc<dyn CuratedImport>>,
    /// Fast same-instance "already running" rejection; the persisted
    /// `is_active` flag is the authoritative cross-restart guard.
    running: AtomicBool,
}

impl ImportRunner {
    #[must_use]
    pub fn new(
        store: Store,
        catalog: Arc<dyn CatalogSource>,
        enrichment: Arc<EnrichmentService>,
    ) -> Self {
        Self {
            source: catalog.source(),
            store,
            catalog,
            enrichment,
            curated: None,
            running: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_curated(mut self, curated: Arc<dyn CuratedImport>) -> Self {
        self.curated = Some(curated);
        self
    }

    #[must_use]
    pub const fn source(&self) -> Source {
        self.source
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the persisted run flag; an active run notices at its next
    /// loop head and stops without touching the persisted checkpoints.
    pub async fn pause(&self) -> Result<()> {
        let key = self.source.as_str();
        self.store.ensure_import_status(key).await?;
        self.store.set_source_active(key, false).await
    }

    /// Run the full phase sequence. Never errors: a duplicate start yields
    /// the sentinel outcome, and a top-level failure is folded into the
    /// outcome after being logged to the status row.
    pub async fn start(&self) -> SyncOutcome {
        if self.running.swap(true, Ordering::SeqCst) {
            return SyncOutcome::already_running();
        }

        let result = self.run().await;
        self.running.store(false, Ordering::SeqCst);

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let key = self.source.as_str();
                let message = format!("Sync aborted: {e}");
                warn!(source = key, "{message}");
                if let Err(persist_err) = self.store.append_sync_error(key, &message).await {
                    warn!(source = key, "Failed to record sync error: {persist_err}");
                }
                // Leave currentPage/cursor as last persisted; only drop the
                // active flag so the operator sees the run stopped.
                if let Err(persist_err) = self.store.set_source_active(key, false).await {
                    warn!(source = key, "Failed to clear active flag: {persist_err}");
                }
                SyncOutcome {
                    imported: 0,
                    updated: 0,
                    errors: vec![message],
                }
            }
        }
    }

    async fn run(&self) -> Result<SyncOutcome> {
        let key = self.source.as_str();
        let status = self.store.ensure_import_status(key).await?;
        if status.is_active {
            return Ok(SyncOutcome::already_running());
        }

        info!(source = key, "Starting import run");
        self.store.set_source_active(key, true).await?;

        let mut outcome = SyncOutcome::default();

        self.health_check().await?;

        if self.refresh_active(&mut outcome).await? == PhaseEnd::Paused {
            info!(source = key, "Run paused during phase 1");
            return Ok(outcome);
        }

        if self.paginate_catalog(&mut outcome).await? == PhaseEnd::Paused {
            info!(source = key, "Run paused during phase 2");
            return Ok(outcome);
        }

        if let Some(curated) = &self.curated {
            if curated.run(self, &mut outcome).await? == PhaseEnd::Paused {
                info!(source = key, "Run paused during phase 3");
                return Ok(outcome);
            }
        }

        self.store.mark_source_synced(key).await?;
        self.store.set_source_active(key, false).await?;
        info!(
            source = key,
            imported = outcome.imported,
            updated = outcome.updated,
            errors = outcome.errors.len(),
            "Import run complete"
        );
        Ok(outcome)
    }

    /// Whether the live pause flag has been cleared under us.
    pub async fn is_paused(&self) -> Result<bool> {
        let status = self
            .store
            .get_import_status(self.source.as_str())
            .await?;
        Ok(!status.is_some_and(|s| s.is_active))
    }

    /// Phase 0: long-running bookkeeping drifts from truth after crashes;
    /// adopt the real record count when the tracked total is badly off.
    async fn health_check(&self) -> Result<()> {
        let key = self.source.as_str();
        let actual = self.store.count_by_source(self.source).await? as i64;
        let status = self.store.ensure_import_status(key).await?;
        let tracked = i64::from(status.total_imported);

        let disparity = (actual - tracked).abs();
        let drifted = disparity > HEALTH_DISPARITY_ABSOLUTE
            || (actual > 0 && disparity as f64 / actual as f64 > HEALTH_DISPARITY_RATIO);

        if drifted {
            warn!(
                source = key,
                tracked, actual, "Tracked import total drifted, correcting from store"
            );
            self.store.set_total_imported(key, actual as i32).await?;
        }
        Ok(())
    }

    /// Phase 1: re-fetch every airing/upcoming record so episode lists,
    /// season counts and status transitions surface.
    async fn refresh_active(&self, outcome: &mut SyncOutcome) -> Result<PhaseEnd> {
        let key = self.source.as_str();
        let records = self
            .store
            .list_by_source_and_status(
                self.source,
                &[ContentStatus::Airing, ContentStatus::Upcoming],
            )
            .await?;
        let total = records.len();
        let mut updated = 0usize;

        self.store
            .set_progress(key, ProgressPhase::Refresh, &format!("0/{total}"))
            .await?;

        for (index, existing) in records.iter().enumerate() {
            if self.is_paused().await? {
                return Ok(PhaseEnd::Paused);
            }
            let Some(id) = existing.id else { continue };

            match self.catalog.fetch_detail(&existing.source_id).await {
                Ok(Some(item)) => {
                    self.store.overwrite_catalog_fields(id, &item.record).await?;
                    self.maybe_enrich(id, existing.imdb_rating, &item).await;
                    updated += 1;
                    outcome.updated += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    let message =
                        format!("Refresh failed for {key} {}: {e}", existing.source_id);
                    outcome.errors.push(message.clone());
                    self.store.append_sync_error(key, &message).await?;
                }
            }

            if (index + 1) % PROGRESS_STRIDE == 0 {
                self.store
                    .set_progress(
                        key,
                        ProgressPhase::Refresh,
                        &format!("{}/{total}", index + 1),
                    )
                    .await?;
            }
        }

        self.store
            .set_progress(
                key,
                ProgressPhase::Refresh,
                &format!("{updated}/{total} (Phase 1 Complete)"),
            )
            .await?;
        Ok(PhaseEnd::Completed)
    }

    /// Phase 2: walk the catalog from the persisted page. The page counter
    /// is the sole resumption checkpoint, so it only advances after the
    /// whole page has been committed.
    async fn paginate_catalog(&self, outcome: &mut SyncOutcome) -> Result<PhaseEnd> {
        let key = self.source.as_str();
        let status = self.store.ensure_import_status(key).await?;
        let mut page = status.current_page.max(1) as u32;
        let mut consecutive_failures = 0u32;

        if let Ok(Some(total)) = self.catalog.total_available().await {
            self.store.set_total_available(key, Some(total)).await?;
        }

        loop {
            if self.is_paused().await? {
                return Ok(PhaseEnd::Paused);
            }

            let items = match self.catalog.fetch_page(page).await {
                Ok(items) => {
                    consecutive_failures = 0;
                    items
                }
                Err(e) => {
                    consecutive_failures += 1;
                    let message = format!("Page {page} fetch failed: {e}");
                    outcome.errors.push(message.clone());
                    self.store.append_sync_error(key, &message).await?;
                    if consecutive_failures >= MAX_CONSECUTIVE_PAGE_FAILURES {
                        anyhow::bail!(
                            "{consecutive_failures} consecutive page failures, last: {e}"
                        );
                    }
                    // Skip the page rather than stalling forever; a later
                    // full resync closes the gap.
                    page += 1;
                    self.store.set_current_page(key, page as i32).await?;
                    continue;
                }
            };

            if items.is_empty() {
                self.store
                    .set_progress(
                        key,
                        ProgressPhase::Paginate,
                        &format!(
                            "(Phase 2 Complete: {} imported, {} updated)",
                            outcome.imported, outcome.updated
                        ),
                    )
                    .await?;
                return Ok(PhaseEnd::Completed);
            }

            for item in &items {
                if let Err(e) = self.upsert_item(item, outcome).await {
                    let message = format!(
                        "Upsert failed for {key} {}: {e}",
                        item.record.source_id
                    );
                    outcome.errors.push(message.clone());
                    self.store.append_sync_error(key, &message).await?;
                }
            }

            page += 1;
            self.store.set_current_page(key, page as i32).await?;
            self.store
                .set_progress(
                    key,
                    ProgressPhase::Paginate,
                    &format!(
                        "page {page}: {} imported, {} updated",
                        outcome.imported, outcome.updated
                    ),
                )
                .await?;
        }
    }

    /// Insert-if-absent, update-if-present by the (source, sourceId) key.
    /// Reprocessing a page is idempotent because of this.
    pub async fn upsert_item(
        &self,
        item: &FetchedItem,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        let key = self.source.as_str();
        let existing = self
            .store
            .get_content_by_key(self.source, &item.record.source_id)
            .await?;

        match existing {
            Some(existing) => {
                let Some(id) = existing.id else {
                    return Ok(());
                };
                self.store.overwrite_catalog_fields(id, &item.record).await?;
                outcome.updated += 1;
                self.maybe_enrich(id, existing.imdb_rating, item).await;
            }
            None => {
                let id = self.store.insert_content(&item.record).await?;
                outcome.imported += 1;
                self.store.increment_total_imported(key, 1).await?;
                self.maybe_enrich(id, None, item).await;
            }
        }
        Ok(())
    }

    /// Import-time enrichment. Failures and quota skips never fail the
    /// item that carried the id.
    async fn maybe_enrich(
        &self,
        content_id: i32,
        existing_rating: Option<f64>,
        item: &FetchedItem,
    ) {
        if existing_rating.is_some() {
            return;
        }
        let Some(imdb_id) = &item.imdb_id else { return };

        if let Err(e) = self.enrichment.enrich(content_id, imdb_id).await {
            warn!(
                source = self.source.as_str(),
                content_id, "Inline enrichment failed: {e}"
            );
        }
    }
}
