//! Smoke tests for the HTTP control surface.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use metarr::config::Config;

async fn spawn_app() -> (Arc<metarr::api::AppState>, Router) {
    let db_path = std::env::temp_dir().join(format!("metarr-api-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.general.max_db_connections = 1;
    // Keep the tests off the network: no keyed sources, no scheduler.
    config.sources.tmdb.enabled = false;
    config.sources.anidb.enabled = false;
    config.scheduler.enabled = false;

    let state = metarr::api::create_app_state_from_config(config, None)
        .await
        .expect("failed to create app state");

    let router = metarr::api::router(state.clone()).await;
    (state, router)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn import_status_round_trip() {
    let (_, app) = spawn_app().await;

    // The per-source row is created lazily on first read.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/import/tvmaze/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["source"], "tvmaze");
    assert_eq!(json["data"]["is_active"], false);
    assert_eq!(json["data"]["current_page"], 1);

    let list_response = app
        .oneshot(
            Request::builder()
                .uri("/api/import/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(list_response.status(), StatusCode::OK);
    let json = body_json(list_response).await;
    assert!(json["data"].as_array().unwrap().len() >= 1);
}

#[tokio::test]
async fn unknown_source_is_not_found() {
    let (_, app) = spawn_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/import/netflix/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disabled_source_start_is_rejected() {
    let (_, app) = spawn_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/import/tmdb/start")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pause_is_idempotent() {
    let (_, app) = spawn_app().await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/import/tvmaze/pause")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn content_browse_and_detail() {
    let (state, app) = spawn_app().await;

    use metarr::domain::{MediaType, Source};
    use metarr::models::content::ContentRecord;

    let mut record = ContentRecord::new(Source::Tvmaze, "82", "Game of Thrones", MediaType::Tv);
    record.year = Some(2011);
    let id = state.shared.store.insert_content(&record).await.unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/content?source=tvmaze&type=tv")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"][0]["title"], "Game of Thrones");

    let detail = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/content/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(detail.status(), StatusCode::OK);
    let json = body_json(detail).await;
    assert_eq!(json["data"]["source_id"], "82");
}

#[tokio::test]
async fn delete_source_clears_records_and_resets_status() {
    let (state, app) = spawn_app().await;

    use metarr::domain::{MediaType, Source};
    use metarr::models::content::ContentRecord;

    let record = ContentRecord::new(Source::Tvmaze, "1", "Doomed Show", MediaType::Tv);
    state.shared.store.insert_content(&record).await.unwrap();
    state
        .shared
        .store
        .ensure_import_status("tvmaze")
        .await
        .unwrap();
    state
        .shared
        .store
        .set_current_page("tvmaze", 42)
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/import/tvmaze")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["deleted_records"], 1);

    assert_eq!(
        state
            .shared
            .store
            .count_by_source(Source::Tvmaze)
            .await
            .unwrap(),
        0
    );
    let status = state
        .shared
        .store
        .get_import_status("tvmaze")
        .await
        .unwrap()
        .unwrap();
    // The next run starts over from phase 1, page 1.
    assert_eq!(status.current_page, 1);
    assert!(status.cursor.is_none());
}

#[tokio::test]
async fn backfill_and_system_status_endpoints() {
    let (_, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/backfill/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    // No OMDb key in tests: the backfill reports itself disabled.
    assert_eq!(json["data"]["enabled"], false);
    assert_eq!(json["data"]["quota"]["used_today"], 0);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/system/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["database_ok"], true);
    assert_eq!(json["data"]["records_by_source"]["tvmaze"], 0);
}
