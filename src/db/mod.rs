use crate::domain::{ContentStatus, MediaType, Source};
use crate::models::content::{ContentRecord, RatingPatch};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::content::ContentFilter;
pub use repositories::import_status::{ImportStatusRow, ProgressPhase};

/// Facade over the repositories. The import runners, the backfill manager
/// and the quota provider only ever see this narrow interface.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn content_repo(&self) -> repositories::content::ContentRepository {
        repositories::content::ContentRepository::new(self.conn.clone())
    }

    fn status_repo(&self) -> repositories::import_status::ImportStatusRepository {
        repositories::import_status::ImportStatusRepository::new(self.conn.clone())
    }

    // ========================================================================
    // Content Store
    // ========================================================================

    pub async fn get_content(&self, id: i32) -> Result<Option<ContentRecord>> {
        self.content_repo().get(id).await
    }

    pub async fn get_content_by_key(
        &self,
        source: Source,
        source_id: &str,
    ) -> Result<Option<ContentRecord>> {
        self.content_repo().get_by_key(source, source_id).await
    }

    pub async fn insert_content(&self, record: &ContentRecord) -> Result<i32> {
        self.content_repo().insert(record).await
    }

    pub async fn overwrite_catalog_fields(&self, id: i32, record: &ContentRecord) -> Result<()> {
        self.content_repo().overwrite_catalog(id, record).await
    }

    pub async fn apply_rating_patch(&self, id: i32, patch: &RatingPatch) -> Result<()> {
        self.content_repo().apply_rating_patch(id, patch).await
    }

    pub async fn list_by_source_and_status(
        &self,
        source: Source,
        statuses: &[ContentStatus],
    ) -> Result<Vec<ContentRecord>> {
        self.content_repo()
            .list_by_source_and_status(source, statuses)
            .await
    }

    pub async fn query_unrated(
        &self,
        media_types: &[MediaType],
        limit: u64,
    ) -> Result<Vec<ContentRecord>> {
        self.content_repo().query_unrated(media_types, limit).await
    }

    pub async fn count_unrated(&self, media_types: &[MediaType]) -> Result<u64> {
        self.content_repo().count_unrated(media_types).await
    }

    pub async fn count_rated(&self, media_type: MediaType) -> Result<u64> {
        self.content_repo().count_rated(media_type).await
    }

    pub async fn count_missing_rating(&self, media_type: MediaType) -> Result<u64> {
        self.content_repo().count_missing_rating(media_type).await
    }

    pub async fn count_by_source(&self, source: Source) -> Result<u64> {
        self.content_repo().count_by_source(source).await
    }

    pub async fn delete_by_source(&self, source: Source) -> Result<u64> {
        self.content_repo().delete_by_source(source).await
    }

    pub async fn list_content(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>> {
        self.content_repo().list(filter).await
    }

    // ========================================================================
    // Import Status Store
    // ========================================================================

    pub async fn get_import_status(&self, source: &str) -> Result<Option<ImportStatusRow>> {
        self.status_repo().get(source).await
    }

    pub async fn ensure_import_status(&self, source: &str) -> Result<ImportStatusRow> {
        self.status_repo().ensure(source).await
    }

    pub async fn set_source_active(&self, source: &str, active: bool) -> Result<()> {
        self.status_repo().set_active(source, active).await
    }

    pub async fn set_current_page(&self, source: &str, page: i32) -> Result<()> {
        self.status_repo().set_current_page(source, page).await
    }

    pub async fn set_total_imported(&self, source: &str, total: i32) -> Result<()> {
        self.status_repo().set_total_imported(source, total).await
    }

    pub async fn increment_total_imported(&self, source: &str, by: i32) -> Result<()> {
        self.status_repo()
            .increment_total_imported(source, by)
            .await
    }

    pub async fn set_total_available(&self, source: &str, total: Option<i32>) -> Result<()> {
        self.status_repo().set_total_available(source, total).await
    }

    pub async fn set_progress(
        &self,
        source: &str,
        phase: ProgressPhase,
        text: &str,
    ) -> Result<()> {
        self.status_repo().set_progress(source, phase, text).await
    }

    pub async fn append_sync_error(&self, source: &str, message: &str) -> Result<()> {
        self.status_repo().append_error(source, message).await
    }

    pub async fn set_cursor(&self, source: &str, cursor: Option<String>) -> Result<()> {
        self.status_repo().set_cursor(source, cursor).await
    }

    pub async fn mark_source_synced(&self, source: &str) -> Result<()> {
        self.status_repo().mark_synced(source).await
    }

    pub async fn reset_import_status(&self, source: &str) -> Result<()> {
        self.status_repo().reset(source).await
    }

    pub async fn list_import_statuses(&self) -> Result<Vec<ImportStatusRow>> {
        self.status_repo().list_all().await
    }
}
