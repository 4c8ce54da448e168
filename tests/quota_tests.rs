//! Quota provider behavior against a real (in-memory) status store.

use chrono::Utc;

use metarr::db::Store;
use metarr::models::cursor::QuotaState;
use metarr::services::quota::{OMDB_QUOTA_SOURCE, QuotaProvider};

async fn memory_store() -> Store {
    Store::with_pool_options("sqlite::memory:", 1, 1)
        .await
        .expect("failed to open in-memory store")
}

async fn seed_state(store: &Store, state: &QuotaState) {
    store.ensure_import_status(OMDB_QUOTA_SOURCE).await.unwrap();
    store
        .set_cursor(
            OMDB_QUOTA_SOURCE,
            Some(serde_json::to_string(state).unwrap()),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn increments_are_monotonic_up_to_exhaustion() {
    let store = memory_store().await;
    let quota = QuotaProvider::new(store.clone(), 5);

    assert!(!quota.is_exhausted().await.unwrap());
    assert_eq!(quota.remaining().await.unwrap(), 5);

    for expected in 1..=5 {
        let state = quota.increment().await.unwrap();
        assert_eq!(state.used_today, expected);
    }

    assert!(quota.is_exhausted().await.unwrap());
    assert_eq!(quota.remaining().await.unwrap(), 0);

    let stats = quota.stats().await.unwrap();
    assert!(stats.exhausted);
    assert_eq!(stats.used_today, 5);
}

#[tokio::test]
async fn state_survives_via_the_store() {
    let store = memory_store().await;

    {
        let quota = QuotaProvider::new(store.clone(), 100);
        quota.increment().await.unwrap();
        quota.increment().await.unwrap();
    }

    // A new provider instance (fresh process) reads the same ground truth.
    let quota = QuotaProvider::new(store.clone(), 100);
    assert_eq!(quota.get().await.unwrap().used_today, 2);
    assert_eq!(quota.remaining().await.unwrap(), 98);
}

#[tokio::test]
async fn stale_day_resets_to_zero() {
    let store = memory_store().await;
    seed_state(
        &store,
        &QuotaState {
            date_utc: "2020-01-01".to_string(),
            used_today: 999,
            daily_limit: 1000,
            next_reset_utc: "2020-01-02T00:00:00+00:00".to_string(),
            exhausted_until_utc: Some("2020-01-02T00:00:00+00:00".to_string()),
        },
    )
    .await;

    let quota = QuotaProvider::new(store.clone(), 1000);
    let state = quota.get().await.unwrap();

    assert_eq!(state.used_today, 0);
    assert_eq!(state.date_utc, Utc::now().format("%Y-%m-%d").to_string());
    assert!(!quota.is_exhausted().await.unwrap());
}

#[tokio::test]
async fn future_exhaustion_stamp_is_authoritative() {
    let store = memory_store().await;
    let now = Utc::now();
    let tomorrow = now + chrono::Duration::days(1);

    // used_today looks available, but the stamp says otherwise.
    seed_state(
        &store,
        &QuotaState {
            date_utc: now.format("%Y-%m-%d").to_string(),
            used_today: 0,
            daily_limit: 1000,
            next_reset_utc: tomorrow.to_rfc3339(),
            exhausted_until_utc: Some(tomorrow.to_rfc3339()),
        },
    )
    .await;

    let quota = QuotaProvider::new(store.clone(), 1000);
    assert!(quota.is_exhausted().await.unwrap());
}

#[tokio::test]
async fn passed_exhaustion_stamp_is_cleared_on_check() {
    let store = memory_store().await;
    let now = Utc::now();
    let an_hour_ago = now - chrono::Duration::hours(1);

    seed_state(
        &store,
        &QuotaState {
            date_utc: now.format("%Y-%m-%d").to_string(),
            used_today: 10,
            daily_limit: 1000,
            next_reset_utc: (now + chrono::Duration::days(1)).to_rfc3339(),
            exhausted_until_utc: Some(an_hour_ago.to_rfc3339()),
        },
    )
    .await;

    let quota = QuotaProvider::new(store.clone(), 1000);
    assert!(!quota.is_exhausted().await.unwrap());

    // The clear was persisted, not just cached.
    let raw = store
        .get_import_status(OMDB_QUOTA_SOURCE)
        .await
        .unwrap()
        .unwrap()
        .cursor
        .unwrap();
    let stored: QuotaState = serde_json::from_str(&raw).unwrap();
    assert!(stored.exhausted_until_utc.is_none());
    assert_eq!(stored.used_today, 10);
}
