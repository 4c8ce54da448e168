//! Integration tests for the multi-phase import runner against an
//! in-memory store and a scripted catalog source.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use metarr::db::Store;
use metarr::domain::{ContentStatus, MediaType, Source};
use metarr::models::content::ContentRecord;
use metarr::services::catalog::{CatalogSource, FetchedItem, ImportRunner};
use metarr::services::enrichment::EnrichmentService;
use metarr::services::quota::QuotaProvider;

async fn memory_store() -> Store {
    // A single connection keeps every query on the same in-memory database.
    Store::with_pool_options("sqlite::memory:", 1, 1)
        .await
        .expect("failed to open in-memory store")
}

fn enrichment(store: &Store) -> Arc<EnrichmentService> {
    let quota = Arc::new(QuotaProvider::new(store.clone(), 1000));
    Arc::new(EnrichmentService::new(store.clone(), None, quota))
}

fn item(source: Source, source_id: &str, title: &str) -> ContentRecord {
    let mut record = ContentRecord::new(source, source_id, title, MediaType::Tv);
    record.status = Some(ContentStatus::Completed);
    record
}

/// Scripted catalog: fixed pages, optional detail payloads, and an
/// optional page index at which the persisted pause flag is flipped
/// mid-fetch (simulating an operator pause landing during a page).
struct ScriptedCatalog {
    source: Source,
    pages: Vec<Vec<ContentRecord>>,
    details: HashMap<String, ContentRecord>,
    fetched_pages: Mutex<Vec<u32>>,
    pause_during_page: Option<(u32, Store)>,
    page_delay_ms: u64,
}

impl ScriptedCatalog {
    fn new(source: Source, pages: Vec<Vec<ContentRecord>>) -> Self {
        Self {
            source,
            pages,
            details: HashMap::new(),
            fetched_pages: Mutex::new(Vec::new()),
            pause_during_page: None,
            page_delay_ms: 0,
        }
    }

    fn fetched(&self) -> Vec<u32> {
        self.fetched_pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogSource for ScriptedCatalog {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<FetchedItem>> {
        self.fetched_pages.lock().unwrap().push(page);

        if self.page_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.page_delay_ms)).await;
        }

        if let Some((pause_page, store)) = &self.pause_during_page {
            if page == *pause_page {
                store
                    .set_source_active(self.source.as_str(), false)
                    .await?;
            }
        }

        let items = self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default();
        Ok(items.into_iter().map(FetchedItem::new).collect())
    }

    async fn fetch_detail(&self, source_id: &str) -> Result<Option<FetchedItem>> {
        Ok(self.details.get(source_id).cloned().map(FetchedItem::new))
    }
}

fn twenty_items() -> Vec<ContentRecord> {
    (1..=20)
        .map(|i| item(Source::Tvmaze, &i.to_string(), &format!("Show {i}")))
        .collect()
}

#[tokio::test]
async fn fresh_import_walks_catalog_to_exhaustion() {
    let store = memory_store().await;
    let catalog = Arc::new(ScriptedCatalog::new(
        Source::Tvmaze,
        vec![twenty_items(), Vec::new()],
    ));
    let runner = ImportRunner::new(store.clone(), catalog.clone(), enrichment(&store));

    let outcome = runner.start().await;

    assert_eq!(outcome.imported, 20);
    assert_eq!(outcome.updated, 0);
    assert!(outcome.errors.is_empty());
    assert_eq!(store.count_by_source(Source::Tvmaze).await.unwrap(), 20);

    let status = store.get_import_status("tvmaze").await.unwrap().unwrap();
    assert!(!status.is_active);
    assert_eq!(status.current_page, 2);
    assert_eq!(status.total_imported, 20);
    assert!(status.last_sync_at.is_some());
    assert!(
        status
            .phase2_progress
            .as_deref()
            .unwrap()
            .contains("Phase 2 Complete")
    );
}

#[tokio::test]
async fn reimporting_the_same_pages_is_idempotent() {
    let store = memory_store().await;
    let pages = vec![twenty_items(), Vec::new()];
    let catalog = Arc::new(ScriptedCatalog::new(Source::Tvmaze, pages.clone()));
    let runner = ImportRunner::new(store.clone(), catalog, enrichment(&store));

    let first = runner.start().await;
    assert_eq!(first.imported, 20);

    // Rewind the checkpoint so the second run walks the identical pages.
    store.set_current_page("tvmaze", 1).await.unwrap();

    let catalog = Arc::new(ScriptedCatalog::new(Source::Tvmaze, pages));
    let runner = ImportRunner::new(store.clone(), catalog, enrichment(&store));
    let second = runner.start().await;

    assert_eq!(second.imported, 0);
    assert_eq!(second.updated, 20);
    // Same (source, sourceId) keys: update path, never duplicate rows.
    assert_eq!(store.count_by_source(Source::Tvmaze).await.unwrap(), 20);
}

#[tokio::test]
async fn resumes_from_persisted_page() {
    let store = memory_store().await;
    store.ensure_import_status("tvmaze").await.unwrap();
    store.set_current_page("tvmaze", 2).await.unwrap();

    let pages = vec![
        vec![item(Source::Tvmaze, "1", "Page One Show")],
        vec![item(Source::Tvmaze, "2", "Page Two Show")],
        Vec::new(),
    ];
    let catalog = Arc::new(ScriptedCatalog::new(Source::Tvmaze, pages));
    let runner = ImportRunner::new(store.clone(), catalog.clone(), enrichment(&store));

    let outcome = runner.start().await;

    // Page 1 is never re-fetched; the walk starts at the checkpoint.
    assert_eq!(catalog.fetched(), vec![2, 3]);
    assert_eq!(outcome.imported, 1);
    assert!(
        store
            .get_content_by_key(Source::Tvmaze, "1")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn concurrent_starts_short_circuit_to_one_run() {
    let store = memory_store().await;
    let mut catalog = ScriptedCatalog::new(Source::Tvmaze, vec![twenty_items(), Vec::new()]);
    catalog.page_delay_ms = 25;
    let catalog = Arc::new(catalog);
    let runner = Arc::new(ImportRunner::new(
        store.clone(),
        catalog.clone(),
        enrichment(&store),
    ));

    let runner_a = Arc::clone(&runner);
    let runner_b = Arc::clone(&runner);
    let (first, second) = tokio::join!(runner_a.start(), runner_b.start());

    let sentinels = [&first, &second]
        .iter()
        .filter(|o| o.is_already_running())
        .count();
    assert_eq!(sentinels, 1, "exactly one start must short-circuit");

    let real = if first.is_already_running() { second } else { first };
    assert_eq!(real.imported, 20);
    // Exactly one set of pages was processed.
    assert_eq!(catalog.fetched(), vec![1, 2]);
    assert_eq!(store.count_by_source(Source::Tvmaze).await.unwrap(), 20);
}

#[tokio::test]
async fn health_check_corrects_drifted_total() {
    let store = memory_store().await;
    for i in 1..=10 {
        store
            .insert_content(&item(Source::Tvmaze, &i.to_string(), &format!("Show {i}")))
            .await
            .unwrap();
    }
    store.ensure_import_status("tvmaze").await.unwrap();
    store.set_total_imported("tvmaze", 500).await.unwrap();

    let catalog = Arc::new(ScriptedCatalog::new(Source::Tvmaze, vec![Vec::new()]));
    let runner = ImportRunner::new(store.clone(), catalog, enrichment(&store));
    runner.start().await;

    let status = store.get_import_status("tvmaze").await.unwrap().unwrap();
    assert_eq!(status.total_imported, 10);
    // Content itself is untouched by the correction.
    assert_eq!(store.count_by_source(Source::Tvmaze).await.unwrap(), 10);
}

#[tokio::test]
async fn pause_breaks_the_loop_and_resume_continues_from_checkpoint() {
    let store = memory_store().await;
    let pages = vec![
        vec![item(Source::Tvmaze, "1", "A")],
        vec![item(Source::Tvmaze, "2", "B")],
        vec![item(Source::Tvmaze, "3", "C")],
        Vec::new(),
    ];

    let mut catalog = ScriptedCatalog::new(Source::Tvmaze, pages.clone());
    catalog.pause_during_page = Some((2, store.clone()));
    let catalog = Arc::new(catalog);
    let runner = ImportRunner::new(store.clone(), catalog.clone(), enrichment(&store));

    runner.start().await;

    // Page 2 was committed before the pause was observed; page 3 was not
    // fetched.
    assert_eq!(catalog.fetched(), vec![1, 2]);
    let status = store.get_import_status("tvmaze").await.unwrap().unwrap();
    assert!(!status.is_active);
    assert_eq!(status.current_page, 3);
    assert!(status.last_sync_at.is_none(), "a paused run is not a sync");

    // Resume: the next run picks up exactly at the checkpoint.
    let catalog = Arc::new(ScriptedCatalog::new(Source::Tvmaze, pages));
    let runner = ImportRunner::new(store.clone(), catalog.clone(), enrichment(&store));
    let outcome = runner.start().await;

    assert_eq!(catalog.fetched(), vec![3, 4]);
    assert_eq!(outcome.imported, 1);
    assert_eq!(store.count_by_source(Source::Tvmaze).await.unwrap(), 3);
}

#[tokio::test]
async fn refresh_phase_overwrites_active_records() {
    let store = memory_store().await;

    let mut stale = item(Source::Tvmaze, "7", "Old Title");
    stale.status = Some(ContentStatus::Airing);
    stale.total_episodes = Some(8);
    let id = store.insert_content(&stale).await.unwrap();
    store.ensure_import_status("tvmaze").await.unwrap();
    store.set_total_imported("tvmaze", 1).await.unwrap();

    let mut fresh = item(Source::Tvmaze, "7", "New Title");
    fresh.status = Some(ContentStatus::Completed);
    fresh.total_episodes = Some(10);

    let mut catalog = ScriptedCatalog::new(Source::Tvmaze, vec![Vec::new()]);
    catalog.details.insert("7".to_string(), fresh);
    let catalog = Arc::new(catalog);
    let runner = ImportRunner::new(store.clone(), catalog, enrichment(&store));

    let outcome = runner.start().await;

    assert_eq!(outcome.updated, 1);
    let stored = store.get_content(id).await.unwrap().unwrap();
    assert_eq!(stored.title, "New Title");
    assert_eq!(stored.status, Some(ContentStatus::Completed));
    assert_eq!(stored.total_episodes, Some(10));

    let status = store.get_import_status("tvmaze").await.unwrap().unwrap();
    assert!(
        status
            .phase1_progress
            .as_deref()
            .unwrap()
            .contains("Phase 1 Complete")
    );
}

#[tokio::test]
async fn rating_fields_survive_catalog_overwrite() {
    let store = memory_store().await;

    let record = item(Source::Tvmaze, "9", "Rated Show");
    let id = store.insert_content(&record).await.unwrap();
    store
        .apply_rating_patch(
            id,
            &metarr::models::content::RatingPatch {
                imdb_id: Some("tt0000009".to_string()),
                imdb_rating: Some(8.2),
                vote_count: Some(1000),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let refreshed = item(Source::Tvmaze, "9", "Rated Show (Renamed)");
    store.overwrite_catalog_fields(id, &refreshed).await.unwrap();

    let stored = store.get_content(id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Rated Show (Renamed)");
    assert_eq!(stored.imdb_rating, Some(8.2));
    assert_eq!(stored.imdb_id.as_deref(), Some("tt0000009"));
    assert_eq!(stored.vote_count, Some(1000));
}

#[tokio::test]
async fn error_list_is_bounded_to_most_recent() {
    let store = memory_store().await;
    store.ensure_import_status("tvmaze").await.unwrap();

    for i in 0..30 {
        store
            .append_sync_error("tvmaze", &format!("error {i}"))
            .await
            .unwrap();
    }

    let status = store.get_import_status("tvmaze").await.unwrap().unwrap();
    assert_eq!(status.errors.len(), 20);
    assert_eq!(status.errors.first().map(String::as_str), Some("error 10"));
    assert_eq!(status.errors.last().map(String::as_str), Some("error 29"));
}
