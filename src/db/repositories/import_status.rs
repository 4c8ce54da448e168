use crate::constants::sync::MAX_TRACKED_ERRORS;
use crate::entities::{import_status, prelude::ImportStatus as ImportStatusEntity};
use anyhow::Result;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Serialize;

/// One row of durable sync bookkeeping, keyed by source name (or one of
/// the pseudo-source keys used by the quota provider and backfill job).
#[derive(Debug, Clone, Serialize)]
pub struct ImportStatusRow {
    pub source: String,
    pub is_active: bool,
    pub current_page: i32,
    pub total_imported: i32,
    pub total_available: Option<i32>,
    pub phase1_progress: Option<String>,
    pub phase2_progress: Option<String>,
    pub phase3_progress: Option<String>,
    pub errors: Vec<String>,
    #[serde(skip_serializing)]
    pub cursor: Option<String>,
    pub last_sync_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Which `phaseN_progress` column a progress string lands in.
#[derive(Debug, Clone, Copy)]
pub enum ProgressPhase {
    Refresh,
    Paginate,
    Curated,
}

pub struct ImportStatusRepository {
    conn: DatabaseConnection,
}

impl ImportStatusRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(model: import_status::Model) -> ImportStatusRow {
        ImportStatusRow {
            source: model.source,
            is_active: model.is_active,
            current_page: model.current_page,
            total_imported: model.total_imported,
            total_available: model.total_available,
            phase1_progress: model.phase1_progress,
            phase2_progress: model.phase2_progress,
            phase3_progress: model.phase3_progress,
            errors: model
                .errors
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            cursor: model.cursor,
            last_sync_at: model.last_sync_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn get(&self, source: &str) -> Result<Option<ImportStatusRow>> {
        let model = ImportStatusEntity::find_by_id(source).one(&self.conn).await?;
        Ok(model.map(Self::map_model))
    }

    /// Fetch the row, creating it lazily on first use.
    pub async fn ensure(&self, source: &str) -> Result<ImportStatusRow> {
        if let Some(existing) = self.get(source).await? {
            return Ok(existing);
        }

        let now = Utc::now().to_rfc3339();
        let model = import_status::ActiveModel {
            source: Set(source.to_string()),
            is_active: Set(false),
            current_page: Set(1),
            total_imported: Set(0),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };
        // A concurrent ensure for the same key may have won the insert race;
        // fall back to reading what landed.
        if let Err(e) = ImportStatusEntity::insert(model).exec(&self.conn).await {
            if let Some(existing) = self.get(source).await? {
                return Ok(existing);
            }
            return Err(e.into());
        }
        self.get(source)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Import status row vanished for {source}"))
    }

    async fn patch<F>(&self, source: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut import_status::ActiveModel),
    {
        let mut model = import_status::ActiveModel {
            source: Set(source.to_string()),
            updated_at: Set(Utc::now().to_rfc3339()),
            ..Default::default()
        };
        apply(&mut model);
        ImportStatusEntity::update(model).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn set_active(&self, source: &str, active: bool) -> Result<()> {
        self.patch(source, |m| m.is_active = Set(active)).await
    }

    pub async fn set_current_page(&self, source: &str, page: i32) -> Result<()> {
        self.patch(source, |m| m.current_page = Set(page)).await
    }

    pub async fn set_total_imported(&self, source: &str, total: i32) -> Result<()> {
        self.patch(source, |m| m.total_imported = Set(total)).await
    }

    pub async fn increment_total_imported(&self, source: &str, by: i32) -> Result<()> {
        ImportStatusEntity::update_many()
            .col_expr(
                import_status::Column::TotalImported,
                Expr::col(import_status::Column::TotalImported).add(by),
            )
            .col_expr(
                import_status::Column::UpdatedAt,
                Expr::value(Utc::now().to_rfc3339()),
            )
            .filter(import_status::Column::Source.eq(source))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn set_total_available(&self, source: &str, total: Option<i32>) -> Result<()> {
        self.patch(source, |m| m.total_available = Set(total)).await
    }

    pub async fn set_progress(
        &self,
        source: &str,
        phase: ProgressPhase,
        text: &str,
    ) -> Result<()> {
        let text = Some(text.to_string());
        self.patch(source, |m| match phase {
            ProgressPhase::Refresh => m.phase1_progress = Set(text),
            ProgressPhase::Paginate => m.phase2_progress = Set(text),
            ProgressPhase::Curated => m.phase3_progress = Set(text),
        })
        .await
    }

    /// Append to the bounded error list; only the most recent
    /// `MAX_TRACKED_ERRORS` entries are kept.
    pub async fn append_error(&self, source: &str, message: &str) -> Result<()> {
        let mut errors = self.ensure(source).await?.errors;
        errors.push(message.to_string());
        if errors.len() > MAX_TRACKED_ERRORS {
            let excess = errors.len() - MAX_TRACKED_ERRORS;
            errors.drain(..excess);
        }
        let encoded = serde_json::to_string(&errors)?;
        self.patch(source, |m| m.errors = Set(Some(encoded))).await
    }

    pub async fn set_cursor(&self, source: &str, cursor: Option<String>) -> Result<()> {
        self.patch(source, |m| m.cursor = Set(cursor)).await
    }

    pub async fn mark_synced(&self, source: &str) -> Result<()> {
        self.patch(source, |m| m.last_sync_at = Set(Some(Utc::now().to_rfc3339())))
            .await
    }

    /// Reset a row to its freshly-created shape so the next run starts from
    /// phase 1, page 1. Used by delete-all-data.
    pub async fn reset(&self, source: &str) -> Result<()> {
        self.patch(source, |m| {
            m.is_active = Set(false);
            m.current_page = Set(1);
            m.total_imported = Set(0);
            m.total_available = Set(None);
            m.phase1_progress = Set(None);
            m.phase2_progress = Set(None);
            m.phase3_progress = Set(None);
            m.errors = Set(None);
            m.cursor = Set(None);
            m.last_sync_at = Set(None);
        })
        .await
    }

    pub async fn list_all(&self) -> Result<Vec<ImportStatusRow>> {
        let rows = ImportStatusEntity::find().all(&self.conn).await?;
        Ok(rows.into_iter().map(Self::map_model).collect())
    }
}
