//! Rating backfill manager behavior: locking, exhaustion flow control and
//! the "checked, no data" stamp.

use chrono::Utc;
use std::sync::Arc;

use metarr::clients::tvmaze::TvmazeClient;
use metarr::db::Store;
use metarr::domain::{MediaType, Source};
use metarr::models::content::ContentRecord;
use metarr::models::cursor::BackfillState;
use metarr::services::backfill::{
    BackfillConfig, RATING_BACKFILL_SOURCE, RatingBackfillService,
};
use metarr::services::enrichment::EnrichmentService;
use metarr::services::quota::QuotaProvider;

async fn memory_store() -> Store {
    Store::with_pool_options("sqlite::memory:", 1, 1)
        .await
        .expect("failed to open in-memory store")
}

fn service(store: &Store, daily_limit: u32) -> (RatingBackfillService, Arc<QuotaProvider>) {
    let quota = Arc::new(QuotaProvider::new(store.clone(), daily_limit));
    // No OMDb client configured: enrichment is a no-op skip, which keeps
    // these tests off the network while exercising the control flow.
    let enrichment = Arc::new(EnrichmentService::new(
        store.clone(),
        None,
        Arc::clone(&quota),
    ));
    let tvmaze = Arc::new(TvmazeClient::new(reqwest::Client::new()));

    let backfill = RatingBackfillService::new(
        store.clone(),
        Arc::clone(&quota),
        enrichment,
        None,
        tvmaze,
        BackfillConfig {
            batch_size: 10,
            interval_minutes: 5,
            lock_minutes: 15,
            startup_delay_secs: 0,
        },
    );
    (backfill, quota)
}

fn unrated_movie(source: Source, source_id: &str, popularity: f64) -> ContentRecord {
    let mut record = ContentRecord::new(source, source_id, format!("Movie {source_id}"), MediaType::Movie);
    record.popularity = Some(popularity);
    record
}

async fn seed_lock(store: &Store, state: &BackfillState) {
    store
        .ensure_import_status(RATING_BACKFILL_SOURCE)
        .await
        .unwrap();
    store
        .set_cursor(
            RATING_BACKFILL_SOURCE,
            Some(serde_json::to_string(state).unwrap()),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn exhausted_quota_skips_the_batch_entirely() {
    let store = memory_store().await;
    store
        .insert_content(&unrated_movie(Source::Manual, "1", 10.0))
        .await
        .unwrap();

    let (backfill, quota) = service(&store, 1);
    quota.increment().await.unwrap(); // used == limit

    let outcome = backfill.process_batch().await.unwrap();

    assert!(outcome.exhausted);
    assert_eq!(outcome.updated, 0);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.failed, 0);

    // The record was never touched.
    let record = store
        .get_content_by_key(Source::Manual, "1")
        .await
        .unwrap()
        .unwrap();
    assert!(record.imdb_checked_at.is_none());
}

#[tokio::test]
async fn zero_unrated_records_is_a_clean_noop() {
    let store = memory_store().await;
    let (backfill, _) = service(&store, 1000);

    let outcome = backfill.process_batch().await.unwrap();

    assert!(!outcome.exhausted);
    assert_eq!(outcome.updated + outcome.skipped + outcome.failed, 0);

    // The run still recorded itself and released the lock.
    let status = backfill.status().await.unwrap();
    assert!(status.state.last_run_at.is_some());
    assert!(status.state.lock_until.is_none());
}

#[tokio::test]
async fn held_lock_skips_the_tick() {
    let store = memory_store().await;
    store
        .insert_content(&unrated_movie(Source::Manual, "1", 10.0))
        .await
        .unwrap();

    let lock_until = (Utc::now() + chrono::Duration::minutes(10)).to_rfc3339();
    seed_lock(
        &store,
        &BackfillState {
            lock_until: Some(lock_until.clone()),
            ..Default::default()
        },
    )
    .await;

    let (backfill, _) = service(&store, 1000);
    let outcome = backfill.process_batch().await.unwrap();

    assert_eq!(outcome.updated + outcome.skipped + outcome.failed, 0);
    assert!(!outcome.exhausted);

    // The foreign lock was not released by the skipped tick.
    let status = backfill.status().await.unwrap();
    assert_eq!(status.state.lock_until.as_deref(), Some(lock_until.as_str()));
    assert!(status.state.last_run_at.is_none());
}

#[tokio::test]
async fn expired_lock_is_reclaimed() {
    let store = memory_store().await;
    let stale = (Utc::now() - chrono::Duration::minutes(30)).to_rfc3339();
    seed_lock(
        &store,
        &BackfillState {
            lock_until: Some(stale),
            ..Default::default()
        },
    )
    .await;

    let (backfill, _) = service(&store, 1000);
    let outcome = backfill.process_batch().await.unwrap();

    assert_eq!(outcome.failed, 0);
    let status = backfill.status().await.unwrap();
    assert!(status.state.lock_until.is_none());
    assert!(status.state.last_run_at.is_some());
}

#[tokio::test]
async fn unresolvable_records_are_stamped_not_retried() {
    let store = memory_store().await;
    // Manual records have no external-id resolution path.
    store
        .insert_content(&unrated_movie(Source::Manual, "42", 5.0))
        .await
        .unwrap();

    let (backfill, _) = service(&store, 1000);
    let first = backfill.process_batch().await.unwrap();
    assert_eq!(first.skipped, 1);

    let record = store
        .get_content_by_key(Source::Manual, "42")
        .await
        .unwrap()
        .unwrap();
    assert!(record.imdb_checked_at.is_some());
    assert!(record.imdb_rating.is_none());

    // Stamped records are no longer candidates on the next tick.
    assert_eq!(
        store.count_unrated(&[MediaType::Movie, MediaType::Tv]).await.unwrap(),
        0
    );
    let second = backfill.process_batch().await.unwrap();
    assert_eq!(second.updated + second.skipped + second.failed, 0);
}

#[tokio::test]
async fn batch_prioritizes_popularity() {
    let store = memory_store().await;
    store
        .insert_content(&unrated_movie(Source::Manual, "low", 1.0))
        .await
        .unwrap();
    store
        .insert_content(&unrated_movie(Source::Manual, "high", 99.0))
        .await
        .unwrap();
    store
        .insert_content(&unrated_movie(Source::Manual, "mid", 50.0))
        .await
        .unwrap();

    let batch = store
        .query_unrated(&[MediaType::Movie, MediaType::Tv], 2)
        .await
        .unwrap();

    let ids: Vec<&str> = batch.iter().map(|r| r.source_id.as_str()).collect();
    assert_eq!(ids, vec!["high", "mid"]);
}

#[tokio::test]
async fn status_reports_per_type_counts_and_quota() {
    let store = memory_store().await;
    store
        .insert_content(&unrated_movie(Source::Manual, "1", 1.0))
        .await
        .unwrap();
    let mut tv = ContentRecord::new(Source::Tvmaze, "2", "Some Show", MediaType::Tv);
    tv.imdb_rating = Some(7.5);
    store.insert_content(&tv).await.unwrap();

    let (backfill, _) = service(&store, 123);
    let status = backfill.status().await.unwrap();

    assert!(!status.enabled);
    assert_eq!(status.movie.unrated, 1);
    assert_eq!(status.movie.rated, 0);
    assert_eq!(status.tv.rated, 1);
    assert_eq!(status.quota.daily_limit, 123);
    assert_eq!(status.quota.remaining, 123);
}
